//! In-memory adapter and emitter fakes for unit tests.

use std::sync::{Arc, Mutex};

use crate::core::bluetooth::adapter::BleAdapter;
use crate::core::bluetooth::types::{
    CharacteristicHandle, CharacteristicProperties, PeripheralHandle, ServiceHandle,
};
use crate::core::buttons::Button;
use crate::core::key_state::KeyAction;
use crate::error::{AdapterError, EmitError};
use crate::mapping::InputEmitter;
use crate::utils::parse_bluetooth_uuid;

/// One command issued to the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterCall {
    StartScan,
    StopScan,
    Connect(String),
    Disconnect(String),
    DiscoverServices(String),
    DiscoverCharacteristics(uuid::Uuid),
    Subscribe(uuid::Uuid),
    Read(uuid::Uuid),
}

#[derive(Clone, Default)]
pub struct RecordingAdapter {
    pub calls: Arc<Mutex<Vec<AdapterCall>>>,
    pub fail_connect: bool,
    pub fail_discover_services: bool,
}

impl RecordingAdapter {
    pub fn calls(&self) -> Vec<AdapterCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &AdapterCall) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: AdapterCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl BleAdapter for RecordingAdapter {
    fn start_scan(&mut self) -> Result<(), AdapterError> {
        self.record(AdapterCall::StartScan);
        Ok(())
    }

    fn stop_scan(&mut self) -> Result<(), AdapterError> {
        self.record(AdapterCall::StopScan);
        Ok(())
    }

    fn connect(&mut self, peripheral: &PeripheralHandle) -> Result<(), AdapterError> {
        self.record(AdapterCall::Connect(peripheral.id.clone()));
        if self.fail_connect {
            return Err(AdapterError::Bluetooth("radio busy".into()));
        }
        Ok(())
    }

    fn disconnect(&mut self, peripheral: &PeripheralHandle) -> Result<(), AdapterError> {
        self.record(AdapterCall::Disconnect(peripheral.id.clone()));
        Ok(())
    }

    fn discover_services(&mut self, peripheral: &PeripheralHandle) -> Result<(), AdapterError> {
        self.record(AdapterCall::DiscoverServices(peripheral.id.clone()));
        if self.fail_discover_services {
            return Err(AdapterError::UnknownPeripheral(peripheral.id.clone()));
        }
        Ok(())
    }

    fn discover_characteristics(&mut self, service: &ServiceHandle) -> Result<(), AdapterError> {
        self.record(AdapterCall::DiscoverCharacteristics(service.uuid));
        Ok(())
    }

    fn subscribe(&mut self, characteristic: &CharacteristicHandle) -> Result<(), AdapterError> {
        self.record(AdapterCall::Subscribe(characteristic.uuid));
        Ok(())
    }

    fn read_value(&mut self, characteristic: &CharacteristicHandle) -> Result<(), AdapterError> {
        self.record(AdapterCall::Read(characteristic.uuid));
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct RecordingEmitter {
    pub actions: Arc<Mutex<Vec<KeyAction>>>,
}

impl RecordingEmitter {
    pub fn actions(&self) -> Vec<KeyAction> {
        self.actions.lock().unwrap().clone()
    }
}

impl InputEmitter for RecordingEmitter {
    fn press(&mut self, button: Button) -> Result<(), EmitError> {
        self.actions.lock().unwrap().push(KeyAction::Press(button));
        Ok(())
    }

    fn release(&mut self, button: Button) -> Result<(), EmitError> {
        self.actions.lock().unwrap().push(KeyAction::Release(button));
        Ok(())
    }
}

pub fn peripheral(id: &str, name: Option<&str>) -> PeripheralHandle {
    PeripheralHandle::new(id, name.map(str::to_string))
}

pub fn service(peripheral_id: &str, id: &str) -> ServiceHandle {
    ServiceHandle {
        peripheral_id: peripheral_id.to_string(),
        uuid: parse_bluetooth_uuid(id).unwrap(),
    }
}

pub fn characteristic(service: &ServiceHandle, id: &str, notify: bool) -> CharacteristicHandle {
    CharacteristicHandle {
        service: service.clone(),
        uuid: parse_bluetooth_uuid(id).unwrap(),
        properties: CharacteristicProperties {
            read: true,
            notify,
            ..Default::default()
        },
    }
}
