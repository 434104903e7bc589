//! Listings, statistics and exported text reports.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use crate::device::{Device, DeviceType, Layer, Service};
use crate::errors::StoreError;

/// Counts over the in-memory inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statistics {
    pub total: usize,
    pub by_type: BTreeMap<DeviceType, usize>,
    pub by_layer: BTreeMap<Layer, usize>,
    pub by_service: BTreeMap<Service, usize>,
    pub by_vlan: BTreeMap<u16, usize>,
}

impl Statistics {
    pub fn collect(devices: &[Device]) -> Self {
        let mut stats = Statistics {
            total: devices.len(),
            ..Default::default()
        };
        for device in devices {
            *stats.by_type.entry(device.device_type()).or_default() += 1;
            if let Some(layer) = device.kind.layer() {
                *stats.by_layer.entry(layer).or_default() += 1;
            }
            for service in device.services() {
                *stats.by_service.entry(service).or_default() += 1;
            }
            for vlan in &device.vlans {
                *stats.by_vlan.entry(*vlan).or_default() += 1;
            }
        }
        stats
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Total devices: {}\n", self.total));

        out.push_str("\nDevices by type:\n");
        push_counts(&mut out, self.by_type.iter().map(|(k, v)| (k.to_string(), *v)));

        out.push_str("\nDevices by layer:\n");
        push_counts(&mut out, self.by_layer.iter().map(|(k, v)| (k.to_string(), *v)));

        out.push_str("\nServices in use:\n");
        push_counts(&mut out, self.by_service.iter().map(|(k, v)| (k.to_string(), *v)));

        out.push_str("\nVLAN usage:\n");
        push_counts(&mut out, self.by_vlan.iter().map(|(k, v)| (format!("VLAN {}", k), *v)));
        out
    }
}

fn push_counts(out: &mut String, rows: impl Iterator<Item = (String, usize)>) {
    let mut any = false;
    for (label, count) in rows {
        any = true;
        out.push_str(&format!("  {:<16} {}\n", label, count));
    }
    if !any {
        out.push_str("  (none)\n");
    }
}

/// Multi-line description of one device.
pub fn device_details(number: usize, device: &Device) -> String {
    format!(
        "#{number} {name}\n  Type:       {kind}\n  IP:         {ip}\n  Layer:      {layer}\n  Services:   {services}\n  VLANs:      {vlans}\n  Registered: {registered}\n",
        name = device.name,
        kind = device.device_type(),
        ip = device.ip(),
        layer = device.layer_label(),
        services = device.services_label(),
        vlans = device.vlans_label(),
        registered = device.registered_at.format("%Y-%m-%d %H:%M:%S"),
    )
}

/// Renders the devices at `indices`, numbered by their inventory position.
pub fn render_devices(devices: &[Device], indices: &[usize]) -> String {
    if indices.is_empty() {
        return "No devices registered.\n".to_string();
    }
    indices
        .iter()
        .filter_map(|&i| devices.get(i).map(|d| device_details(i + 1, d)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One line per device, used by pickers.
pub fn summary_line(number: usize, device: &Device) -> String {
    format!(
        "{:>3}. {:<24} {:<9} {}",
        number,
        device.name,
        device.device_type().to_string(),
        device.ip()
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Statistics,
    DeviceList,
}

impl ReportKind {
    fn file_prefix(self) -> &'static str {
        match self {
            ReportKind::Statistics => "statistics",
            ReportKind::DeviceList => "devices",
        }
    }
}

/// Builds the text of an exported report.
pub fn report_body(kind: ReportKind, devices: &[Device], campus: Option<&str>, user: Option<&str>) -> String {
    let mut out = String::new();
    out.push_str("NETWORK DEVICE INVENTORY REPORT\n");
    out.push_str(&format!("Generated: {}\n", Local::now().format("%Y-%m-%d %H:%M:%S")));
    if let Some(campus) = campus {
        out.push_str(&format!("Campus: {}\n", campus));
    }
    if let Some(user) = user {
        out.push_str(&format!("Generated by: {}\n", user));
    }
    out.push_str(&"=".repeat(48));
    out.push('\n');
    match kind {
        ReportKind::Statistics => out.push_str(&Statistics::collect(devices).render()),
        ReportKind::DeviceList => {
            let all: Vec<usize> = (0..devices.len()).collect();
            out.push_str(&render_devices(devices, &all));
        }
    }
    out
}

/// Writes a timestamped report under `dir`, creating it when absent.
pub fn export_report(
    dir: &Path,
    kind: ReportKind,
    devices: &[Device],
    campus: Option<&str>,
    user: Option<&str>,
) -> Result<PathBuf, StoreError> {
    fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
    let stem = format!("{}_{}", kind.file_prefix(), Local::now().format("%Y%m%d_%H%M%S"));
    let body = report_body(kind, devices, campus, user);

    // Never overwrite: a second export within the same second gets a suffix.
    let mut attempt = 1;
    loop {
        let file_name = if attempt == 1 {
            format!("{}.txt", stem)
        } else {
            format!("{}_{}.txt", stem, attempt)
        };
        let path = dir.join(file_name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(body.as_bytes()).map_err(|e| StoreError::io(&path, e))?;
                info!(path = %path.display(), ?kind, "report exported");
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists && attempt < MAX_REPORT_SUFFIX => attempt += 1,
            Err(e) => return Err(StoreError::io(&path, e)),
        }
    }
}

const MAX_REPORT_SUFFIX: u32 = 100;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceKind, IpAssignment};
    use pretty_assertions::assert_eq;
    use std::net::Ipv4Addr;

    fn sample() -> Vec<Device> {
        let router = DeviceKind::build(
            DeviceType::Router,
            IpAssignment::Static(Ipv4Addr::new(10, 0, 0, 1)),
            Some(Layer::Core),
            [Service::Routing, Service::Ssh].into_iter().collect(),
        )
        .unwrap();
        let server = DeviceKind::build(
            DeviceType::Server,
            IpAssignment::Static(Ipv4Addr::new(10, 0, 0, 2)),
            None,
            [Service::Ssh].into_iter().collect(),
        )
        .unwrap();
        vec![
            Device::new("core-1", router, [10, 20]),
            Device::new("srv-1", server, [20]),
            Device::new("pc-1", DeviceKind::Pc { ip: IpAssignment::Dhcp }, []),
        ]
    }

    #[test]
    fn statistics_group_counts() {
        let stats = Statistics::collect(&sample());
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_type.get(&DeviceType::Router), Some(&1));
        assert_eq!(stats.by_type.get(&DeviceType::Pc), Some(&1));
        assert_eq!(stats.by_layer.len(), 1);
        assert_eq!(stats.by_layer.get(&Layer::Core), Some(&1));
        assert_eq!(stats.by_service.get(&Service::Ssh), Some(&2));
        assert_eq!(stats.by_vlan.get(&20), Some(&2));
        assert_eq!(stats.by_vlan.get(&10), Some(&1));
    }

    #[test]
    fn empty_statistics_render_none() {
        let text = Statistics::collect(&[]).render();
        assert!(text.contains("Total devices: 0"));
        assert!(text.contains("(none)"));
    }

    #[test]
    fn export_creates_directory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let reports = dir.path().join("reports");
        let path = export_report(&reports, ReportKind::DeviceList, &sample(), Some("campus uno"), Some("admin")).unwrap();
        assert!(path.starts_with(&reports));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("devices_") && name.ends_with(".txt"));

        let body = fs::read_to_string(&path).unwrap();
        assert!(body.contains("Campus: campus uno"));
        assert!(body.contains("#1 core-1"));
        assert!(body.contains("#3 pc-1"));
    }

    #[test]
    fn exports_in_the_same_second_do_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..3)
            .map(|_| export_report(dir.path(), ReportKind::Statistics, &sample(), None, None).unwrap())
            .collect();
        assert_ne!(paths[0], paths[1]);
        assert_ne!(paths[1], paths[2]);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[test]
    fn listing_of_nothing() {
        assert_eq!(render_devices(&sample(), &[]), "No devices registered.\n");
    }
}
