//! Control characteristic acquisition
//! Drives service discovery, characteristic discovery and the choice between
//! notifications and polling for one connected peripheral.

use log::{error, info, warn};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::config::target_config::TargetSpec;
use crate::core::bluetooth::adapter::BleAdapter;
use crate::core::bluetooth::events::ControlEvent;
use crate::core::bluetooth::session::{ConnectionSession, DeliveryMode};
use crate::core::bluetooth::types::{CharacteristicHandle, PeripheralHandle, ServiceHandle};
use crate::error::AdapterError;

/// Where the acquisition currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquireStage {
    #[default]
    Idle,
    DiscoveringServices,
    /// Waiting on characteristic discovery for this many matching services.
    DiscoveringCharacteristics(usize),
    Ready(DeliveryMode),
    /// Nothing matched; no data will ever arrive on this connection.
    Stalled,
    /// A discovery step failed; no data will ever arrive on this connection.
    Halted,
}

/// What a discovery step produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Pending,
    Ready(DeliveryMode),
    Halted,
}

pub struct CharacteristicAcquirer {
    service_id: Uuid,
    characteristic_id: Uuid,
    poll_interval: Duration,
    events: UnboundedSender<ControlEvent>,
    stage: AcquireStage,
}

impl CharacteristicAcquirer {
    pub fn new(target: &TargetSpec, events: UnboundedSender<ControlEvent>) -> Self {
        Self {
            service_id: target.service_id,
            characteristic_id: target.characteristic_id,
            poll_interval: target.poll_interval,
            events,
            stage: AcquireStage::Idle,
        }
    }

    pub fn stage(&self) -> AcquireStage {
        self.stage
    }

    pub fn reset(&mut self) {
        self.stage = AcquireStage::Idle;
    }

    /// Starts acquisition on a freshly connected peripheral.
    pub fn begin<A: BleAdapter + ?Sized>(
        &mut self,
        adapter: &mut A,
        peripheral: &PeripheralHandle,
    ) -> AcquireOutcome {
        info!("Connected to {}, discovering services...", peripheral);
        match adapter.discover_services(peripheral) {
            Ok(()) => {
                self.stage = AcquireStage::DiscoveringServices;
                AcquireOutcome::Pending
            }
            Err(e) => self.halt("discovering services", &e),
        }
    }

    pub fn on_services_discovered<A: BleAdapter + ?Sized>(
        &mut self,
        adapter: &mut A,
        services: Result<Vec<ServiceHandle>, AdapterError>,
    ) -> AcquireOutcome {
        if self.stage != AcquireStage::DiscoveringServices {
            warn!("Ignoring service discovery result in stage {:?}", self.stage);
            return AcquireOutcome::Pending;
        }

        let services = match services {
            Ok(services) => services,
            Err(e) => return self.halt("discovering services", &e),
        };

        let mut pending = 0;
        for service in &services {
            info!("Discovered service: {}", service.uuid);
            if service.uuid != self.service_id {
                continue;
            }
            info!("Found target service {}", service.uuid);
            match adapter.discover_characteristics(service) {
                Ok(()) => pending += 1,
                Err(e) => error!("Error discovering characteristics for service {}: {}", service.uuid, e),
            }
        }

        self.stage = if pending > 0 {
            AcquireStage::DiscoveringCharacteristics(pending)
        } else {
            info!("Target service {} not found, no control data will arrive", self.service_id);
            AcquireStage::Stalled
        };
        AcquireOutcome::Pending
    }

    /// Handles one service's characteristics. The first match decides the delivery
    /// mode; later matches are ignored.
    pub fn on_characteristics_discovered<A: BleAdapter + ?Sized>(
        &mut self,
        adapter: &mut A,
        session: &mut ConnectionSession,
        service: &ServiceHandle,
        characteristics: Result<Vec<CharacteristicHandle>, AdapterError>,
    ) -> AcquireOutcome {
        let AcquireStage::DiscoveringCharacteristics(pending) = self.stage else {
            warn!("Ignoring characteristic discovery result in stage {:?}", self.stage);
            return AcquireOutcome::Pending;
        };

        let characteristics = match characteristics {
            Ok(characteristics) => characteristics,
            Err(e) => {
                error!("Error discovering characteristics for service {}: {}", service.uuid, e);
                self.stage = AcquireStage::Halted;
                return AcquireOutcome::Halted;
            }
        };

        for characteristic in characteristics {
            info!(
                "Discovered characteristic: {} for service: {}",
                characteristic.uuid, service.uuid
            );
            if characteristic.uuid != self.characteristic_id {
                continue;
            }
            info!("Found control characteristic");
            info!(
                "Characteristic {} properties: {}",
                characteristic.uuid, characteristic.properties
            );
            return self.select_delivery(adapter, session, characteristic);
        }

        self.stage = if pending > 1 {
            AcquireStage::DiscoveringCharacteristics(pending - 1)
        } else {
            info!(
                "Control characteristic {} not found, no control data will arrive",
                self.characteristic_id
            );
            AcquireStage::Stalled
        };
        AcquireOutcome::Pending
    }

    fn select_delivery<A: BleAdapter + ?Sized>(
        &mut self,
        adapter: &mut A,
        session: &mut ConnectionSession,
        characteristic: CharacteristicHandle,
    ) -> AcquireOutcome {
        if session.delivery_mode != DeliveryMode::Unset {
            warn!("Delivery mode already {:?}, ignoring", session.delivery_mode);
            return AcquireOutcome::Pending;
        }

        let mode = if characteristic.properties.notify {
            if let Err(e) = adapter.subscribe(&characteristic) {
                return self.halt("subscribing to the control characteristic", &e);
            }
            info!("Subscribed to control characteristic notifications.");
            DeliveryMode::Notify
        } else {
            let events = self.events.clone();
            session.poll.start(self.poll_interval, move |tick| {
                let _ = events.send(ControlEvent::PollTick(tick));
            });
            DeliveryMode::Poll
        };

        session.control_characteristic = Some(characteristic);
        session.delivery_mode = mode;
        self.stage = AcquireStage::Ready(mode);
        AcquireOutcome::Ready(mode)
    }

    fn halt(&mut self, what: &str, e: &AdapterError) -> AcquireOutcome {
        error!("Error {}: {}", what, e);
        self.stage = AcquireStage::Halted;
        AcquireOutcome::Halted
    }
}
