//! Bluetooth side of the key bridge
//! This module handles scanning for the target controller, connecting to it,
//! locating its control characteristic and receiving the button byte.

pub mod acquirer;
pub mod adapter;
pub mod bluest_adapter;
pub mod constants;
pub mod events;
pub mod manager;
pub mod poll;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-export types that should be publicly accessible
pub use acquirer::{AcquireOutcome, AcquireStage, CharacteristicAcquirer};
pub use adapter::BleAdapter;
pub use bluest_adapter::BluestAdapter;
pub use events::{AdapterEvent, ControlEvent};
pub use manager::ConnectionController;
pub use poll::{PollScheduler, PollTick};
pub use session::{ConnectedPhase, ConnectionSession, DeliveryMode, LinkState};
pub use types::{
    AdapterState, CharacteristicHandle, CharacteristicProperties, PeripheralHandle, ServiceHandle,
};
