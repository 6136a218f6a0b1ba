use anyhow::{Context, Result};
use ble_keybridge_lib::cli::Cli;
use ble_keybridge_lib::config::AppConfig;
use ble_keybridge_lib::core::bluetooth::{BluestAdapter, ConnectionController};
use ble_keybridge_lib::logging;
use ble_keybridge_lib::mapping::KeyboardSender;
use clap::Parser;
use log::{error, info};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level);

    let config_path = match cli.config {
        Some(path) => path,
        None => AppConfig::default_path()?,
    };
    let mut config = AppConfig::load_config(&config_path).await?;
    if let Some(name) = cli.target_name {
        config.target.target_peripheral_name = name;
    }

    if cli.write_default_config {
        config.save_config(&config_path).await?;
        return Ok(());
    }

    let target = config.target.to_spec().context("invalid target configuration")?;
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();

    let adapter = BluestAdapter::new(events_tx.clone())
        .await
        .context("failed to open the Bluetooth adapter")?;
    let keyboard = KeyboardSender::new(&config.keymap).context("failed to start keyboard output")?;

    let mut controller = ConnectionController::new(adapter, keyboard, target, events_tx)
        .with_rescan_on_disconnect(config.reconnect);

    let shutdown = CancellationToken::new();
    let shutdown_on_signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Interrupt received, shutting down."),
            Err(e) => error!("Failed to listen for interrupt: {}", e),
        }
        shutdown_on_signal.cancel();
    });

    if let Err(e) = controller.run(&mut events_rx, shutdown).await {
        error!("Error while closing the Bluetooth adapter: {}", e);
    }
    info!("Exited.");
    Ok(())
}
