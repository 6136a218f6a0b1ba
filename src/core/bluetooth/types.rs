//! Defines shared data structures for the Bluetooth module.

use std::fmt;
use uuid::Uuid;

use crate::core::bluetooth::constants::UNKNOWN_NAME;

/// A discovered peripheral, as reported by the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralHandle {
    /// Platform-specific unique identifier for the device
    pub id: String,
    /// The advertised name of the device, if any
    pub advertised_name: Option<String>,
}

impl PeripheralHandle {
    pub fn new(id: impl Into<String>, advertised_name: Option<String>) -> Self {
        Self {
            id: id.into(),
            advertised_name,
        }
    }

    pub fn display_name(&self) -> &str {
        self.advertised_name.as_deref().unwrap_or(UNKNOWN_NAME)
    }

    /// Exact match of the advertised name against `name`.
    pub fn is_named(&self, name: &str) -> bool {
        self.advertised_name.as_deref() == Some(name)
    }
}

impl fmt::Display for PeripheralHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (id: {})", self.display_name(), self.id)
    }
}

/// A GATT service on a connected peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHandle {
    pub peripheral_id: String,
    pub uuid: Uuid,
}

/// Capability flags advertised by a characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharacteristicProperties {
    pub broadcast: bool,
    pub read: bool,
    pub write_without_response: bool,
    pub write: bool,
    pub notify: bool,
    pub indicate: bool,
    pub authenticated_signed_writes: bool,
    pub extended_properties: bool,
}

impl CharacteristicProperties {
    pub fn names(&self) -> Vec<&'static str> {
        [
            (self.broadcast, "Broadcast"),
            (self.read, "Read"),
            (self.write_without_response, "Write Without Response"),
            (self.write, "Write"),
            (self.notify, "Notify"),
            (self.indicate, "Indicate"),
            (self.authenticated_signed_writes, "Authenticated Signed Writes"),
            (self.extended_properties, "Extended Properties"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect()
    }
}

impl fmt::Display for CharacteristicProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(", "))
    }
}

impl From<bluest::CharacteristicProperties> for CharacteristicProperties {
    fn from(p: bluest::CharacteristicProperties) -> Self {
        Self {
            broadcast: p.broadcast,
            read: p.read,
            write_without_response: p.write_without_response,
            write: p.write,
            notify: p.notify,
            indicate: p.indicate,
            authenticated_signed_writes: p.authenticated_signed_writes,
            extended_properties: p.extended_properties,
        }
    }
}

/// A characteristic within a discovered service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicHandle {
    pub service: ServiceHandle,
    pub uuid: Uuid,
    pub properties: CharacteristicProperties,
}

/// Radio state reported by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    PoweredOn,
    PoweredOff,
    Unavailable,
}

impl AdapterState {
    pub fn is_ready(self) -> bool {
        self == AdapterState::PoweredOn
    }
}
