//! Error types shared by the Bluetooth and input layers.

use thiserror::Error;
use uuid::Uuid;

use crate::core::buttons::Button;

/// Errors reported by a [`BleAdapter`](crate::core::bluetooth::BleAdapter).
///
/// Cloneable so that it can travel inside adapter events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("no Bluetooth adapter found")]
    NoAdapter,
    #[error("unknown peripheral: {0}")]
    UnknownPeripheral(String),
    #[error("unknown service: {0}")]
    UnknownService(Uuid),
    #[error("unknown characteristic: {0}")]
    UnknownCharacteristic(Uuid),
    #[error("bluetooth error: {0}")]
    Bluetooth(String),
    #[error("adapter is closed")]
    Closed,
}

impl From<bluest::Error> for AdapterError {
    fn from(e: bluest::Error) -> Self {
        AdapterError::Bluetooth(e.to_string())
    }
}

/// Errors reported by an [`InputEmitter`](crate::mapping::InputEmitter).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
    #[error("no key mapped for {0}")]
    Unmapped(Button),
    #[error("input backend error: {0}")]
    Backend(String),
    #[error("keyboard thread is gone")]
    ThreadGone,
}
