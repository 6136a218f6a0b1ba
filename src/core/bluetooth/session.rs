//! The single live connection attempt and its data path.

use std::fmt;

use crate::core::bluetooth::poll::PollScheduler;
use crate::core::bluetooth::types::{CharacteristicHandle, PeripheralHandle};

/// How raw values reach the controller once the characteristic is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    #[default]
    Unset,
    Notify,
    Poll,
}

/// Phase of an established connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectedPhase {
    Acquiring,
    Streaming,
}

/// Connection lifecycle state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Idle,
    Scanning,
    Connecting,
    Connected(ConnectedPhase),
    Disconnected,
}

impl LinkState {
    /// Connecting or connected: the peripheral may hold a link that needs cancelling.
    pub fn has_link(self) -> bool {
        matches!(self, LinkState::Connecting | LinkState::Connected(_))
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Idle => f.write_str("Idle"),
            LinkState::Scanning => f.write_str("Scanning"),
            LinkState::Connecting => f.write_str("Connecting"),
            LinkState::Connected(ConnectedPhase::Acquiring) => f.write_str("Connected(Acquiring)"),
            LinkState::Connected(ConnectedPhase::Streaming) => f.write_str("Connected(Streaming)"),
            LinkState::Disconnected => f.write_str("Disconnected"),
        }
    }
}

/// One attempt/connection to the target peripheral.
pub struct ConnectionSession {
    pub peripheral: PeripheralHandle,
    pub control_characteristic: Option<CharacteristicHandle>,
    pub delivery_mode: DeliveryMode,
    pub poll: PollScheduler,
}

impl ConnectionSession {
    pub fn new(peripheral: PeripheralHandle) -> Self {
        Self {
            peripheral,
            control_characteristic: None,
            delivery_mode: DeliveryMode::Unset,
            poll: PollScheduler::new(),
        }
    }

    pub fn is_for(&self, peripheral: &PeripheralHandle) -> bool {
        self.peripheral.id == peripheral.id
    }

    /// Whether `characteristic` is this session's control characteristic.
    pub fn is_control(&self, characteristic: &CharacteristicHandle) -> bool {
        self.control_characteristic.as_ref().is_some_and(|c| {
            c.uuid == characteristic.uuid
                && c.service.peripheral_id == characteristic.service.peripheral_id
        })
    }

    /// Stops the poll timer and clears the data path.
    pub fn teardown(&mut self) {
        self.poll.stop();
        self.control_characteristic = None;
    }
}
