//! [`BleAdapter`] backed by the platform Bluetooth stack through bluest.
//!
//! Every command spawns a tokio task and reports its outcome as an
//! [`AdapterEvent`] on the control channel.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bluest::{Adapter, Characteristic, ConnectionEvent, Device, Service};
use futures_util::future::join_all;
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use regex::Regex;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::adapter::BleAdapter;
use crate::core::bluetooth::constants::SHUTDOWN_DISCONNECT_TIMEOUT;
use crate::core::bluetooth::events::{AdapterEvent, ControlEvent};
use crate::core::bluetooth::types::{
    AdapterState, CharacteristicHandle, PeripheralHandle, ServiceHandle,
};
use crate::error::AdapterError;

type ServiceKey = (String, Uuid);
type CharacteristicKey = (String, Uuid, Uuid);

/// Platform objects behind the handles given to the controller.
#[derive(Default)]
struct Registry {
    devices: HashMap<String, Device>,
    services: HashMap<ServiceKey, Service>,
    characteristics: HashMap<CharacteristicKey, Characteristic>,
}

impl Registry {
    fn forget_peripheral(&mut self, peripheral_id: &str) {
        self.services.retain(|(id, _), _| id != peripheral_id);
        self.characteristics.retain(|(id, _, _), _| id != peripheral_id);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn characteristic_key(characteristic: &CharacteristicHandle) -> CharacteristicKey {
    (
        characteristic.service.peripheral_id.clone(),
        characteristic.service.uuid,
        characteristic.uuid,
    )
}

pub struct BluestAdapter {
    adapter: Adapter,
    events: UnboundedSender<ControlEvent>,
    registry: Arc<Mutex<Registry>>,
    /// Cancels everything tied to the adapter's lifetime.
    root_token: CancellationToken,
    scan_token: Option<CancellationToken>,
    /// Cancels connection watchers, notification streams and reads of the current link.
    link_token: CancellationToken,
    pending_disconnects: Vec<JoinHandle<()>>,
}

impl BluestAdapter {
    /// Opens the default adapter and starts reporting its power state.
    pub async fn new(events: UnboundedSender<ControlEvent>) -> Result<Self, AdapterError> {
        let adapter = Adapter::default().await.ok_or(AdapterError::NoAdapter)?;
        let root_token = CancellationToken::new();

        tokio::spawn(Self::watch_adapter_state(
            adapter.clone(),
            events.clone(),
            root_token.child_token(),
        ));

        Ok(Self {
            adapter,
            events,
            registry: Arc::new(Mutex::new(Registry::default())),
            link_token: root_token.child_token(),
            root_token,
            scan_token: None,
            pending_disconnects: Vec::new(),
        })
    }

    async fn watch_adapter_state(
        adapter: Adapter,
        events: UnboundedSender<ControlEvent>,
        cancel_token: CancellationToken,
    ) {
        let initial = match adapter.is_available().await {
            Ok(true) => AdapterState::PoweredOn,
            Ok(false) => AdapterState::PoweredOff,
            Err(e) => {
                warn!("Failed to query adapter availability: {}", e);
                AdapterState::Unavailable
            }
        };
        emit(&events, AdapterEvent::StateChanged(initial));

        let mut stream = match adapter.events().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Adapter state events unavailable: {}", e);
                if initial != AdapterState::PoweredOn {
                    tokio::select! {
                        _ = cancel_token.cancelled() => {}
                        _ = adapter.wait_available() => {
                            emit(&events, AdapterEvent::StateChanged(AdapterState::PoweredOn));
                        }
                    }
                }
                return;
            }
        };

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                next = stream.next() => match next {
                    Some(Ok(bluest::AdapterEvent::Available)) => {
                        emit(&events, AdapterEvent::StateChanged(AdapterState::PoweredOn));
                    }
                    Some(Ok(bluest::AdapterEvent::Unavailable)) => {
                        emit(&events, AdapterEvent::StateChanged(AdapterState::PoweredOff));
                    }
                    Some(Err(e)) => warn!("Error in adapter event stream: {}", e),
                    None => break,
                }
            }
        }
        debug!("Adapter state watcher stopped.");
    }

    /// Runs `task` until it finishes or `cancel_token` fires.
    fn spawn_cancellable<F>(cancel_token: CancellationToken, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel_token.cancelled() => {}
                _ = task => {}
            }
        })
    }

    fn device(&self, peripheral: &PeripheralHandle) -> Result<Device, AdapterError> {
        lock(&self.registry)
            .devices
            .get(&peripheral.id)
            .cloned()
            .ok_or_else(|| AdapterError::UnknownPeripheral(peripheral.id.clone()))
    }

    fn characteristic(
        &self,
        characteristic: &CharacteristicHandle,
    ) -> Result<Characteristic, AdapterError> {
        lock(&self.registry)
            .characteristics
            .get(&characteristic_key(characteristic))
            .cloned()
            .ok_or(AdapterError::UnknownCharacteristic(characteristic.uuid))
    }

    async fn scan_task(
        adapter: Adapter,
        registry: Arc<Mutex<Registry>>,
        events: UnboundedSender<ControlEvent>,
    ) {
        let mut scan_stream = match adapter.scan(&[]).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to start Bluetooth scan: {}", e);
                return;
            }
        };

        while let Some(discovered) = scan_stream.next().await {
            let device = discovered.device;
            let id = device.id().to_string();
            let name = discovered
                .adv_data
                .local_name
                .or_else(|| device.name().ok());
            debug!(
                "Found device - ID: {}, Address: {}, RSSI: {:?}",
                id,
                extract_mac_address(&id).unwrap_or_else(|| "N/A".to_string()),
                discovered.rssi
            );

            lock(&registry).devices.insert(id.clone(), device);
            emit(&events, AdapterEvent::Discovered(PeripheralHandle::new(id, name)));
        }
        info!("Bluetooth scan stream has ended.");
    }

    async fn watch_connection(
        adapter: Adapter,
        device: Device,
        peripheral: PeripheralHandle,
        events: UnboundedSender<ControlEvent>,
    ) {
        let mut connection_events = match adapter.device_connection_events(&device).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Cannot watch connection of {}: {}", peripheral, e);
                return;
            }
        };
        while let Some(event) = connection_events.next().await {
            if let ConnectionEvent::Disconnected = event {
                emit(&events, AdapterEvent::Disconnected { peripheral, error: None });
                return;
            }
        }
    }

    async fn notification_task(
        characteristic: Characteristic,
        handle: CharacteristicHandle,
        events: UnboundedSender<ControlEvent>,
    ) {
        let mut notification_stream = match characteristic.notify().await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to subscribe to notifications: {}", e);
                emit(
                    &events,
                    AdapterEvent::ValueUpdated {
                        characteristic: handle,
                        value: Err(e.into()),
                    },
                );
                return;
            }
        };

        info!("Listening for control characteristic notifications...");
        while let Some(result) = notification_stream.next().await {
            emit(
                &events,
                AdapterEvent::ValueUpdated {
                    characteristic: handle.clone(),
                    value: result.map_err(AdapterError::from),
                },
            );
        }
        info!("Notification stream ended");
    }
}

#[async_trait]
impl BleAdapter for BluestAdapter {
    fn start_scan(&mut self) -> Result<(), AdapterError> {
        if let Some(previous) = self.scan_token.take() {
            previous.cancel();
        }
        let scan_token = self.root_token.child_token();
        Self::spawn_cancellable(
            scan_token.clone(),
            Self::scan_task(self.adapter.clone(), self.registry.clone(), self.events.clone()),
        );
        self.scan_token = Some(scan_token);
        debug!("Device scan task started.");
        Ok(())
    }

    fn stop_scan(&mut self) -> Result<(), AdapterError> {
        match self.scan_token.take() {
            Some(scan_token) => scan_token.cancel(),
            None => debug!("No active scan to stop."),
        }
        Ok(())
    }

    fn connect(&mut self, peripheral: &PeripheralHandle) -> Result<(), AdapterError> {
        let device = self.device(peripheral)?;
        self.link_token.cancel();
        self.link_token = self.root_token.child_token();

        let adapter = self.adapter.clone();
        let events = self.events.clone();
        let link_token = self.link_token.clone();
        let peripheral = peripheral.clone();
        Self::spawn_cancellable(self.link_token.clone(), async move {
            if let Err(e) = adapter.connect_device(&device).await {
                emit(
                    &events,
                    AdapterEvent::ConnectFailed {
                        peripheral,
                        error: e.into(),
                    },
                );
                return;
            }
            emit(&events, AdapterEvent::Connected(peripheral.clone()));
            Self::spawn_cancellable(
                link_token,
                Self::watch_connection(adapter, device, peripheral, events),
            );
        });
        Ok(())
    }

    fn disconnect(&mut self, peripheral: &PeripheralHandle) -> Result<(), AdapterError> {
        let device = self.device(peripheral)?;
        self.link_token.cancel();
        lock(&self.registry).forget_peripheral(&peripheral.id);

        let adapter = self.adapter.clone();
        let peripheral = peripheral.clone();
        self.pending_disconnects.push(tokio::spawn(async move {
            info!("Disconnecting from {}", peripheral);
            match adapter.disconnect_device(&device).await {
                Ok(()) => info!("Successfully disconnected"),
                Err(e) => error!("Failed to disconnect from {}: {}", peripheral, e),
            }
        }));
        Ok(())
    }

    fn discover_services(&mut self, peripheral: &PeripheralHandle) -> Result<(), AdapterError> {
        let device = self.device(peripheral)?;
        let registry = self.registry.clone();
        let events = self.events.clone();
        let peripheral = peripheral.clone();
        Self::spawn_cancellable(self.link_token.clone(), async move {
            let services = match device.discover_services().await {
                Ok(services) => {
                    let mut registry = lock(&registry);
                    let handles = services
                        .into_iter()
                        .map(|service| {
                            let uuid = service.uuid();
                            registry.services.insert((peripheral.id.clone(), uuid), service);
                            ServiceHandle {
                                peripheral_id: peripheral.id.clone(),
                                uuid,
                            }
                        })
                        .collect::<Vec<_>>();
                    Ok(handles)
                }
                Err(e) => Err(e),
            };
            emit(
                &events,
                AdapterEvent::ServicesDiscovered {
                    peripheral,
                    services: services.map_err(AdapterError::from),
                },
            );
        });
        Ok(())
    }

    fn discover_characteristics(&mut self, service: &ServiceHandle) -> Result<(), AdapterError> {
        let key = (service.peripheral_id.clone(), service.uuid);
        let bluest_service = lock(&self.registry)
            .services
            .get(&key)
            .cloned()
            .ok_or(AdapterError::UnknownService(service.uuid))?;

        let registry = self.registry.clone();
        let events = self.events.clone();
        let service = service.clone();
        Self::spawn_cancellable(self.link_token.clone(), async move {
            let characteristics = match bluest_service.discover_characteristics().await {
                Ok(found) => {
                    let mut handles = Vec::with_capacity(found.len());
                    for characteristic in found {
                        let properties = match characteristic.properties().await {
                            Ok(properties) => properties.into(),
                            Err(e) => {
                                warn!(
                                    "Failed to read properties of {}: {}",
                                    characteristic.uuid(),
                                    e
                                );
                                Default::default()
                            }
                        };
                        let handle = CharacteristicHandle {
                            service: service.clone(),
                            uuid: characteristic.uuid(),
                            properties,
                        };
                        lock(&registry)
                            .characteristics
                            .insert(characteristic_key(&handle), characteristic);
                        handles.push(handle);
                    }
                    Ok(handles)
                }
                Err(e) => Err(AdapterError::from(e)),
            };
            emit(
                &events,
                AdapterEvent::CharacteristicsDiscovered {
                    service,
                    characteristics,
                },
            );
        });
        Ok(())
    }

    fn subscribe(&mut self, characteristic: &CharacteristicHandle) -> Result<(), AdapterError> {
        let bluest_characteristic = self.characteristic(characteristic)?;
        Self::spawn_cancellable(
            self.link_token.clone(),
            Self::notification_task(bluest_characteristic, characteristic.clone(), self.events.clone()),
        );
        Ok(())
    }

    fn read_value(&mut self, characteristic: &CharacteristicHandle) -> Result<(), AdapterError> {
        let bluest_characteristic = self.characteristic(characteristic)?;
        let events = self.events.clone();
        let characteristic = characteristic.clone();
        Self::spawn_cancellable(self.link_token.clone(), async move {
            let value = bluest_characteristic.read().await.map_err(AdapterError::from);
            emit(
                &events,
                AdapterEvent::ValueUpdated {
                    characteristic,
                    value,
                },
            );
        });
        Ok(())
    }

    async fn close(&mut self) -> Result<(), AdapterError> {
        self.root_token.cancel();
        let pending = std::mem::take(&mut self.pending_disconnects);
        if pending.is_empty() {
            return Ok(());
        }

        info!("Waiting for {} pending disconnect(s)...", pending.len());
        if tokio::time::timeout(SHUTDOWN_DISCONNECT_TIMEOUT, join_all(pending))
            .await
            .is_err()
        {
            warn!(
                "Disconnect did not complete within {} seconds",
                SHUTDOWN_DISCONNECT_TIMEOUT.as_secs()
            );
        }
        Ok(())
    }
}

fn emit(events: &UnboundedSender<ControlEvent>, event: AdapterEvent) {
    if events.send(event.into()).is_err() {
        debug!("Control loop is gone, dropping adapter event.");
    }
}

/// Pulls a MAC address out of a platform device id, when the platform embeds one.
fn extract_mac_address(device_id: &str) -> Option<String> {
    let re = Regex::new(r"([0-9A-Fa-f]{2}[:_-]){5}([0-9A-Fa-f]{2})").ok()?;
    re.find_iter(device_id)
        .last()
        .map(|m| m.as_str().replace('_', ":").to_uppercase())
}
