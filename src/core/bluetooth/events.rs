//! Events consumed by the connection controller.

use crate::core::bluetooth::poll::PollTick;
use crate::core::bluetooth::types::{
    AdapterState, CharacteristicHandle, PeripheralHandle, ServiceHandle,
};
use crate::error::AdapterError;

/// Adapter callbacks, delivered in the order the adapter produced them.
#[derive(Debug, Clone)]
pub enum AdapterEvent {
    StateChanged(AdapterState),
    Discovered(PeripheralHandle),
    Connected(PeripheralHandle),
    ConnectFailed {
        peripheral: PeripheralHandle,
        error: AdapterError,
    },
    Disconnected {
        peripheral: PeripheralHandle,
        error: Option<AdapterError>,
    },
    ServicesDiscovered {
        peripheral: PeripheralHandle,
        services: Result<Vec<ServiceHandle>, AdapterError>,
    },
    CharacteristicsDiscovered {
        service: ServiceHandle,
        characteristics: Result<Vec<CharacteristicHandle>, AdapterError>,
    },
    ValueUpdated {
        characteristic: CharacteristicHandle,
        value: Result<Vec<u8>, AdapterError>,
    },
}

/// Everything the single control loop reacts to.
#[derive(Debug, Clone)]
pub enum ControlEvent {
    Adapter(AdapterEvent),
    PollTick(PollTick),
}

impl From<AdapterEvent> for ControlEvent {
    fn from(event: AdapterEvent) -> Self {
        ControlEvent::Adapter(event)
    }
}
