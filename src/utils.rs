use anyhow::Result;
use log::{error, info};
use std::path::Path;
use tokio::fs;
use uuid::Uuid;

use crate::core::bluetooth::constants::BLUETOOTH_BASE_UUID;

/// Asynchronously ensures that a directory exists, creating it if it does not.
/// This function is idempotent.
pub async fn ensure_directory_exists<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        if let Err(e) = fs::create_dir_all(path).await {
            error!("Failed to create directory at {:?}: {}", path, e);
            return Err(e.into());
        }
        info!("Created directory at: {:?}", path);
    }
    Ok(())
}

/// Parses a Bluetooth identifier: 16-bit (`"180f"`) or 32-bit shorthand expands
/// against the Bluetooth base UUID, anything else must be a full UUID.
pub fn parse_bluetooth_uuid(id: &str) -> Option<Uuid> {
    let id = id.trim();
    let id = id
        .strip_prefix("0x")
        .or_else(|| id.strip_prefix("0X"))
        .unwrap_or(id);

    if (id.len() == 4 || id.len() == 8) && id.chars().all(|c| c.is_ascii_hexdigit()) {
        let short = u32::from_str_radix(id, 16).ok()?;
        return Some(Uuid::from_u128(
            BLUETOOTH_BASE_UUID.as_u128() | ((short as u128) << 96),
        ));
    }
    Uuid::parse_str(id).ok()
}
