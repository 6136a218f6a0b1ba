//! Command-line interface of the key bridge

use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

/// Turns a BLE controller's button byte into keyboard events
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(name = "ble-keybridge")]
pub struct Cli {
    /// Configuration file path (defaults to the platform config directory)
    #[arg(short, long, env = "KEYBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Advertised name of the controller to connect to (overrides the config file)
    #[arg(short, long, env = "KEYBRIDGE_TARGET")]
    pub target_name: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(short, long, default_value = "info", env = "KEYBRIDGE_LOG")]
    pub log_level: LevelFilter,

    /// Write the effective configuration to the config path and exit
    #[arg(long)]
    pub write_default_config: bool,
}
