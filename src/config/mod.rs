pub mod keymap_config;
pub mod target_config;

use anyhow::{anyhow, Result};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::config::keymap_config::KeymapConfig;
use crate::config::target_config::TargetConfig;
use crate::utils::ensure_directory_exists;

const CONFIG_DIR_NAME: &str = "ble-keybridge";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub target: TargetConfig,
    pub keymap: KeymapConfig,
    /// Scan again after the controller disconnects
    pub reconnect: bool,
}

impl AppConfig {
    /// `<platform config dir>/ble-keybridge/config.json`
    pub fn default_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("no configuration directory on this platform"))?;
        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads the config from `path`, falling back to defaults when the file is missing.
    pub async fn load_config(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file not found at {:?}, using default.", path);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&config_json)
            .map_err(|e| anyhow!("invalid config file {:?}: {}", path, e))?;

        info!("Config loaded from {:?}", path);
        Ok(config)
    }

    /// Saves the config to `path`, creating its directory if needed.
    pub async fn save_config(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            ensure_directory_exists(parent).await?;
        }

        let config_json = match serde_json::to_string_pretty(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(path, config_json).await?;
        info!("Config saved to {:?}.", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_config(&dir.path().join("absent.json")).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(!config.reconnect);
    }

    #[tokio::test]
    async fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = AppConfig::default();
        config.target.target_peripheral_name = "Pad_01".into();
        config.keymap.button_a = Some("z".into());
        config.reconnect = true;
        config.save_config(&path).await.unwrap();

        assert_eq!(AppConfig::load_config(&path).await.unwrap(), config);
    }

    #[tokio::test]
    async fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{ "target": { "poll_interval_seconds": 0.25 } }"#).unwrap();

        let config = AppConfig::load_config(&path).await.unwrap();
        assert_eq!(config.target.poll_interval_seconds, 0.25);
        assert_eq!(config.target.target_peripheral_name, "Controller_E18D");
        assert_eq!(config.keymap, KeymapConfig::default());
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "{ not json").unwrap();
        assert!(AppConfig::load_config(&path).await.is_err());
    }

    #[test]
    fn default_path_ends_with_app_dir() {
        if let Ok(path) = AppConfig::default_path() {
            assert!(path.ends_with("ble-keybridge/config.json"));
        }
    }
}
