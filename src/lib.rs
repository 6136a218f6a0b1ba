//! BLE key bridge library
//! Connects to a BLE game controller, decodes its button byte and turns button
//! changes into keyboard press/release events.

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod mapping;
pub mod utils;

pub use config::AppConfig;
pub use error::{AdapterError, EmitError};
