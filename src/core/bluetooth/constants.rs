//! Constants used throughout the application
//! This module contains default target identifiers, intervals and timeouts.

use std::time::Duration;
use uuid::Uuid;

/// The advertised name of the default target controller
pub const DEFAULT_TARGET_NAME: &str = "Controller_E18D";

/// Default service carrying the control characteristic (Battery Service, repurposed)
pub const DEFAULT_SERVICE_ID: &str = "180f";

/// Default control characteristic (Battery Level, repurposed)
pub const DEFAULT_CHARACTERISTIC_ID: &str = "2a19";

/// Default poll interval when the control characteristic cannot notify
pub const DEFAULT_POLL_INTERVAL_SECS: f64 = 0.1;

/// Bluetooth base UUID, used to expand 16-bit and 32-bit shorthand identifiers
pub const BLUETOOTH_BASE_UUID: Uuid = Uuid::from_u128(0x00000000_0000_1000_8000_00805f9b34fb);

/// Upper bound on waiting for outstanding disconnects during shutdown
pub const SHUTDOWN_DISCONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Advertised-name placeholder used in diagnostics
pub const UNKNOWN_NAME: &str = "Unknown";
