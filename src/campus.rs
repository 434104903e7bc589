//! Per-campus text files.
//!
//! One file per campus, each device a block of `Key: value` lines between
//! delimiter lines. Additions append a block; deletions and service changes
//! rewrite the file from the remaining devices. Blocks that were skipped at
//! load (unreadable, invalid or duplicate) are written back unchanged after
//! them.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{debug, warn};

use crate::device::{Device, DeviceRecord, NOT_APPLICABLE};
use crate::errors::StoreError;
use crate::inventory::Inventory;
use crate::store::{ensure_parent, records_to_devices, DeviceStore};

pub const BLOCK_DELIMITER: &str = "---------------------------------";

pub const DEFAULT_CAMPUSES: [&str; 4] = ["zona core", "campus uno", "campus matriz", "sector outsourcing"];

/// Path of the text file backing `campus`.
pub fn campus_file(dir: &Path, campus: &str) -> PathBuf {
    dir.join(format!("{}.txt", campus))
}

/// Renders one device as a delimited block.
pub fn format_block(device: &Device) -> String {
    let record = DeviceRecord::from(device);
    let services = if record.services.is_empty() {
        NOT_APPLICABLE.to_string()
    } else {
        record.services.join(", ")
    };
    let mut block = String::new();
    block.push('\n');
    block.push_str(BLOCK_DELIMITER);
    block.push('\n');
    block.push_str(&format!("Type: {}\n", record.device_type));
    block.push_str(&format!("Name: {}\n", record.name));
    block.push_str(&format!("IP: {}\n", record.ip));
    block.push_str(&format!("Layer: {}\n", record.layer));
    block.push_str(&format!("Services: {}\n", services));
    block.push_str(&format!("VLANs: {}\n", device.vlans_label()));
    block.push_str(&format!("Registered: {}\n", device.registered_at.to_rfc3339()));
    block.push_str(BLOCK_DELIMITER);
    block.push('\n');
    block
}

fn split_list(value: &str) -> Vec<String> {
    if value.trim().is_empty() || value.trim() == NOT_APPLICABLE {
        return Vec::new();
    }
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn block_to_record(fields: &HashMap<String, String>) -> Option<DeviceRecord> {
    let get = |key: &str| fields.get(key).cloned();
    let vlans = match get("vlans") {
        Some(text) => {
            let mut vlans = Vec::new();
            for token in split_list(&text) {
                vlans.push(token.parse::<u16>().ok()?);
            }
            vlans
        }
        None => Vec::new(),
    };
    Some(DeviceRecord {
        device_type: get("type")?,
        name: get("name")?,
        ip: get("ip").unwrap_or_else(|| NOT_APPLICABLE.to_string()),
        layer: get("layer").unwrap_or_else(|| NOT_APPLICABLE.to_string()),
        services: get("services").map(|s| split_list(&s)).unwrap_or_default(),
        vlans,
        registration_timestamp: get("registered")
            .and_then(|ts| DateTime::parse_from_rfc3339(&ts).ok())
            .map(|ts| ts.with_timezone(&Local)),
    })
}

/// One delimited block as it appears in a campus file.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RawBlock {
    lines: Vec<String>,
}

impl RawBlock {
    fn record(&self) -> Option<DeviceRecord> {
        let fields: HashMap<String, String> = self
            .lines
            .iter()
            .filter_map(|line| line.split_once(':'))
            .map(|(key, value)| (key.trim().to_lowercase(), value.trim().to_string()))
            .collect();
        block_to_record(&fields)
    }

    fn render(&self) -> String {
        format!("\n{}\n{}\n{}\n", BLOCK_DELIMITER, self.lines.join("\n"), BLOCK_DELIMITER)
    }
}

fn split_blocks(contents: &str) -> Vec<RawBlock> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.chars().all(|c| c == '-') {
            if !current.is_empty() {
                blocks.push(RawBlock { lines: std::mem::take(&mut current) });
            }
            continue;
        }
        current.push(line.to_string());
    }
    if !current.is_empty() {
        blocks.push(RawBlock { lines: current });
    }
    blocks
}

/// Parses a campus file into records. Blocks missing a type or name are
/// skipped with a warning.
pub fn parse_blocks(contents: &str) -> Vec<DeviceRecord> {
    split_blocks(contents)
        .into_iter()
        .filter_map(|block| {
            let record = block.record();
            if record.is_none() {
                warn!(lines = ?block.lines, "skipping unreadable device block");
            }
            record
        })
        .collect()
}

/// Blocks a load of `contents` would not turn into inventory devices,
/// in file order.
fn skipped_blocks(contents: &str) -> Vec<RawBlock> {
    let mut accepted = Inventory::default();
    split_blocks(contents)
        .into_iter()
        .filter(|block| {
            match block.record().and_then(|record| Device::try_from(record).ok()) {
                Some(device) => accepted.add(device).is_err(),
                None => true,
            }
        })
        .collect()
}

/// Text store bound to one campus.
#[derive(Debug, Clone)]
pub struct CampusTextStore {
    dir: PathBuf,
    campus: String,
}

impl CampusTextStore {
    pub fn new(dir: impl Into<PathBuf>, campus: impl Into<String>) -> Self {
        CampusTextStore {
            dir: dir.into(),
            campus: campus.into(),
        }
    }

    pub fn campus(&self) -> &str {
        &self.campus
    }

    pub fn path(&self) -> PathBuf {
        campus_file(&self.dir, &self.campus)
    }
}

impl DeviceStore for CampusTextStore {
    fn describe(&self) -> String {
        self.path().display().to_string()
    }

    fn load(&self) -> Result<Vec<Device>, StoreError> {
        let path = self.path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
        Ok(records_to_devices(parse_blocks(&contents), &self.describe()))
    }

    fn record_added(&self, _devices: &[Device], added: &Device) -> Result<(), StoreError> {
        let path = self.path();
        ensure_parent(&path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e))?;
        file.write_all(format_block(added).as_bytes())
            .map_err(|e| StoreError::io(&path, e))?;
        debug!(campus = %self.campus, device = %added.name, "device block appended");
        Ok(())
    }

    fn record_changed(&self, devices: &[Device]) -> Result<(), StoreError> {
        let path = self.path();
        ensure_parent(&path)?;
        let kept = if path.exists() {
            let previous = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
            skipped_blocks(&previous)
        } else {
            Vec::new()
        };
        let mut contents: String = devices.iter().map(format_block).collect();
        contents.extend(kept.iter().map(RawBlock::render));
        fs::write(&path, contents).map_err(|e| StoreError::io(&path, e))?;
        debug!(campus = %self.campus, count = devices.len(), kept = kept.len(), "campus file rewritten");
        Ok(())
    }
}

/// Store used before a campus has been picked in text mode.
#[derive(Debug, Clone, Default)]
pub struct UnboundCampusStore;

impl DeviceStore for UnboundCampusStore {
    fn describe(&self) -> String {
        "no campus selected".to_string()
    }

    fn load(&self) -> Result<Vec<Device>, StoreError> {
        Ok(Vec::new())
    }

    fn record_added(&self, _devices: &[Device], _added: &Device) -> Result<(), StoreError> {
        Err(StoreError::NoCampus)
    }

    fn record_changed(&self, _devices: &[Device]) -> Result<(), StoreError> {
        Err(StoreError::NoCampus)
    }
}
