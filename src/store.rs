//! Persistence of the device list.
//!
//! Both stores rewrite their file wholesale; there is no per-record update
//! in place. Loading never aborts a session: callers go through
//! [`load_or_empty`] which degrades to an empty list.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::device::{Device, DeviceRecord};
use crate::errors::StoreError;

pub trait DeviceStore {
    /// Human readable location, shown in messages.
    fn describe(&self) -> String;

    fn load(&self) -> Result<Vec<Device>, StoreError>;

    /// Called after `added` was appended to `devices`.
    fn record_added(&self, devices: &[Device], added: &Device) -> Result<(), StoreError>;

    /// Called after a delete or an in-place change.
    fn record_changed(&self, devices: &[Device]) -> Result<(), StoreError>;
}

/// Loads from `store`, falling back to an empty list on any failure.
pub fn load_or_empty(store: &dyn DeviceStore) -> (Vec<Device>, Option<StoreError>) {
    match store.load() {
        Ok(devices) => {
            debug!(store = %store.describe(), count = devices.len(), "inventory loaded");
            (devices, None)
        }
        Err(e) => {
            warn!(store = %store.describe(), error = %e, "could not load inventory, starting empty");
            (Vec::new(), Some(e))
        }
    }
}

/// Converts persisted records, skipping the ones that no longer validate.
pub(crate) fn records_to_devices(records: Vec<DeviceRecord>, origin: &str) -> Vec<Device> {
    records
        .into_iter()
        .filter_map(|record| {
            let name = record.name.clone();
            match Device::try_from(record) {
                Ok(device) => Some(device),
                Err(e) => {
                    warn!(origin, device = %name, error = %e, "skipping invalid device record");
                    None
                }
            }
        })
        .collect()
}

pub(crate) fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
    }
    Ok(())
}

/// A single JSON file holding an array of device records.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_all(&self, devices: &[Device]) -> Result<(), StoreError> {
        ensure_parent(&self.path)?;
        let records: Vec<DeviceRecord> = devices.iter().map(DeviceRecord::from).collect();
        let json = serde_json::to_string_pretty(&records).map_err(|e| StoreError::Malformed {
            path: self.describe(),
            reason: e.to_string(),
        })?;
        fs::write(&self.path, json).map_err(|e| StoreError::io(&self.path, e))?;
        debug!(path = %self.path.display(), count = devices.len(), "inventory written");
        Ok(())
    }
}

impl DeviceStore for JsonStore {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<Vec<Device>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        let records: Vec<DeviceRecord> =
            serde_json::from_str(&contents).map_err(|e| StoreError::Malformed {
                path: self.describe(),
                reason: e.to_string(),
            })?;
        Ok(records_to_devices(records, &self.describe()))
    }

    fn record_added(&self, devices: &[Device], _added: &Device) -> Result<(), StoreError> {
        self.write_all(devices)
    }

    fn record_changed(&self, devices: &[Device]) -> Result<(), StoreError> {
        self.write_all(devices)
    }
}
