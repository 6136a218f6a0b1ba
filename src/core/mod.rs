//! Core functionality for the key bridge
//! This module contains the Bluetooth connection logic, the button byte decoder
//! and the key state translator.

pub mod bluetooth;
pub mod buttons;
pub mod key_state;

// Re-export commonly used types
pub use bluetooth::ConnectionController;
pub use buttons::{decode, Button, ButtonSet};
pub use key_state::{KeyAction, KeyStateTranslator};
