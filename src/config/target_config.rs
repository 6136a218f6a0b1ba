use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::core::bluetooth::constants::{
    DEFAULT_CHARACTERISTIC_ID, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_SERVICE_ID, DEFAULT_TARGET_NAME,
};
use crate::utils::parse_bluetooth_uuid;

/// Which peripheral to bridge and where its button byte lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Advertised name that must match exactly
    pub target_peripheral_name: String,
    /// Service holding the control characteristic (16/32-bit shorthand or full UUID)
    pub target_service_id: String,
    /// The control characteristic
    pub target_characteristic_id: String,
    /// Read interval used when the characteristic cannot notify
    pub poll_interval_seconds: f64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        TargetConfig {
            target_peripheral_name: DEFAULT_TARGET_NAME.to_string(),
            target_service_id: DEFAULT_SERVICE_ID.to_string(),
            target_characteristic_id: DEFAULT_CHARACTERISTIC_ID.to_string(),
            poll_interval_seconds: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

impl TargetConfig {
    /// Validates the configuration into the immutable form used at runtime.
    pub fn to_spec(&self) -> Result<TargetSpec> {
        if self.target_peripheral_name.is_empty() {
            return Err(anyhow!("target_peripheral_name must not be empty"));
        }
        let service_id = parse_bluetooth_uuid(&self.target_service_id)
            .ok_or_else(|| anyhow!("invalid target_service_id: {:?}", self.target_service_id))?;
        let characteristic_id = parse_bluetooth_uuid(&self.target_characteristic_id)
            .ok_or_else(|| {
                anyhow!("invalid target_characteristic_id: {:?}", self.target_characteristic_id)
            })?;
        if !self.poll_interval_seconds.is_finite() || self.poll_interval_seconds <= 0.0 {
            return Err(anyhow!(
                "poll_interval_seconds must be positive, got {}",
                self.poll_interval_seconds
            ));
        }

        Ok(TargetSpec {
            peripheral_name: self.target_peripheral_name.clone(),
            service_id,
            characteristic_id,
            poll_interval: Duration::from_secs_f64(self.poll_interval_seconds),
        })
    }
}

/// Read-only target description, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    pub peripheral_name: String,
    pub service_id: Uuid,
    pub characteristic_id: Uuid,
    pub poll_interval: Duration,
}

impl Default for TargetSpec {
    fn default() -> Self {
        Self {
            peripheral_name: DEFAULT_TARGET_NAME.to_string(),
            service_id: parse_bluetooth_uuid(DEFAULT_SERVICE_ID).unwrap_or_default(),
            characteristic_id: parse_bluetooth_uuid(DEFAULT_CHARACTERISTIC_ID).unwrap_or_default(),
            poll_interval: Duration::from_secs_f64(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}
