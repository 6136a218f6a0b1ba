//! The BLE adapter boundary.
//!
//! Every command returns as soon as the request is issued. Outcomes arrive later as
//! [`AdapterEvent`](crate::core::bluetooth::AdapterEvent)s on the control channel,
//! so no command blocks the control loop. An `Err` here means the request could
//! not be issued at all.

use async_trait::async_trait;

use crate::core::bluetooth::types::{CharacteristicHandle, PeripheralHandle, ServiceHandle};
use crate::error::AdapterError;

#[async_trait]
pub trait BleAdapter: Send {
    fn start_scan(&mut self) -> Result<(), AdapterError>;

    fn stop_scan(&mut self) -> Result<(), AdapterError>;

    fn connect(&mut self, peripheral: &PeripheralHandle) -> Result<(), AdapterError>;

    fn disconnect(&mut self, peripheral: &PeripheralHandle) -> Result<(), AdapterError>;

    fn discover_services(&mut self, peripheral: &PeripheralHandle) -> Result<(), AdapterError>;

    fn discover_characteristics(&mut self, service: &ServiceHandle) -> Result<(), AdapterError>;

    /// Subscribes to value notifications; each change arrives as a `ValueUpdated` event.
    fn subscribe(&mut self, characteristic: &CharacteristicHandle) -> Result<(), AdapterError>;

    /// Requests one read; the value arrives as a `ValueUpdated` event.
    fn read_value(&mut self, characteristic: &CharacteristicHandle) -> Result<(), AdapterError>;

    /// Waits for outstanding teardown work (pending disconnects) to finish.
    async fn close(&mut self) -> Result<(), AdapterError> {
        Ok(())
    }
}
