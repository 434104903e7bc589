use std::collections::BTreeSet;

use tracing::warn;

use crate::device::{check_services, Device, IpAssignment, Service};
use crate::errors::InventoryError;

/// Outcome of merging services into an existing device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceMerge {
    pub added: Vec<Service>,
    pub already_present: Vec<Service>,
}

/// The in-memory device list of a session, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    devices: Vec<Device>,
}

impl Inventory {
    /// Builds an inventory from loaded devices. Later devices that clash
    /// with an earlier name or address are dropped with a warning.
    pub fn new(devices: Vec<Device>) -> Self {
        let mut inventory = Inventory::default();
        inventory.replace_all(devices);
        inventory
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Device> {
        self.devices.get(index)
    }

    /// Replaces the contents with `devices`, applying the same uniqueness
    /// rules as [`Inventory::add`]. Returns the devices that were dropped.
    pub fn replace_all(&mut self, devices: Vec<Device>) -> Vec<Device> {
        self.devices.clear();
        let mut dropped = Vec::new();
        for device in devices {
            if let Err(e) = self.check_name_free(&device.name).and_then(|_| self.check_ip_free(&device.ip())) {
                warn!(device = %device.name, error = %e, "skipping duplicate device");
                dropped.push(device);
                continue;
            }
            self.devices.push(device);
        }
        dropped
    }

    /// Fails if another device already uses `name` (case-insensitive).
    pub fn check_name_free(&self, name: &str) -> Result<(), InventoryError> {
        let wanted = name.trim().to_lowercase();
        match self.devices.iter().find(|d| d.name.to_lowercase() == wanted) {
            Some(existing) => Err(InventoryError::DuplicateName(existing.name.clone())),
            None => Ok(()),
        }
    }

    /// Fails if a static address is already assigned. DHCP and N/A never clash.
    pub fn check_ip_free(&self, ip: &IpAssignment) -> Result<(), InventoryError> {
        let Some(addr) = ip.address() else {
            return Ok(());
        };
        match self.devices.iter().find(|d| d.ip().address() == Some(addr)) {
            Some(existing) => Err(InventoryError::DuplicateIp(addr.to_string(), existing.name.clone())),
            None => Ok(()),
        }
    }

    /// Appends a device after the uniqueness checks; returns its index.
    pub fn add(&mut self, device: Device) -> Result<usize, InventoryError> {
        self.check_name_free(&device.name)?;
        self.check_ip_free(&device.ip())?;
        self.devices.push(device);
        Ok(self.devices.len() - 1)
    }

    /// Indices of devices whose name contains `query`, ignoring case.
    /// A blank query matches nothing.
    pub fn search(&self, query: &str) -> Vec<usize> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        self.devices
            .iter()
            .enumerate()
            .filter(|(_, d)| d.name.to_lowercase().contains(&query))
            .map(|(i, _)| i)
            .collect()
    }

    /// Indices of devices that can take services.
    pub fn service_capable(&self) -> Vec<usize> {
        self.devices
            .iter()
            .enumerate()
            .filter(|(_, d)| d.device_type().carries_services())
            .map(|(i, _)| i)
            .collect()
    }

    /// Unions `services` into the device at `index`.
    pub fn add_services(
        &mut self,
        index: usize,
        services: &BTreeSet<Service>,
    ) -> Result<ServiceMerge, InventoryError> {
        let device = self
            .devices
            .get_mut(index)
            .ok_or(InventoryError::NoSuchDevice(index + 1))?;
        let device_type = device.device_type();
        let Some(existing) = device.kind.services_mut() else {
            return Err(InventoryError::ServicesNotSupported(device_type.to_string()));
        };
        check_services(device_type, services)?;

        let mut merge = ServiceMerge::default();
        for service in services {
            if existing.insert(*service) {
                merge.added.push(*service);
            } else {
                merge.already_present.push(*service);
            }
        }
        Ok(merge)
    }

    pub fn delete(&mut self, index: usize) -> Result<Device, InventoryError> {
        if index >= self.devices.len() {
            return Err(InventoryError::NoSuchDevice(index + 1));
        }
        Ok(self.devices.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceKind, DeviceType, Layer};
    use std::net::Ipv4Addr;

    fn server(name: &str, last: u8) -> Device {
        let kind = DeviceKind::build(
            DeviceType::Server,
            IpAssignment::Static(Ipv4Addr::new(10, 0, 0, last)),
            None,
            [Service::Dns].into_iter().collect(),
        )
        .unwrap();
        Device::new(name, kind, [])
    }

    #[test]
    fn duplicate_ip_rejected_then_new_ip_accepted() {
        let mut inv = Inventory::default();
        inv.add(server("dns-1", 5)).unwrap();

        let err = inv.add(server("web-1", 5)).unwrap_err();
        assert_eq!(err, InventoryError::DuplicateIp("10.0.0.5".into(), "dns-1".into()));
        assert_eq!(inv.len(), 1);

        assert_eq!(inv.add(server("web-1", 6)), Ok(1));
        assert_eq!(inv.len(), 2);
    }

    #[test]
    fn names_unique_ignoring_case() {
        let mut inv = Inventory::default();
        inv.add(server("DNS-1", 5)).unwrap();
        assert_eq!(
            inv.add(server("dns-1", 9)),
            Err(InventoryError::DuplicateName("DNS-1".into()))
        );
    }

    #[test]
    fn dhcp_and_unassigned_never_clash() {
        let mut inv = Inventory::default();
        for name in ["pc-1", "pc-2"] {
            inv.add(Device::new(name, DeviceKind::Pc { ip: IpAssignment::Dhcp }, [])).unwrap();
        }
        for name in ["sw-1", "sw-2"] {
            let kind = DeviceKind::Switch { ip: IpAssignment::None, layer: Layer::Access };
            inv.add(Device::new(name, kind, [])).unwrap();
        }
        assert_eq!(inv.len(), 4);
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let inv = Inventory::new(vec![server("Core-DNS", 1), server("edge-web", 2), server("dns-backup", 3)]);
        assert_eq!(inv.search("dns"), vec![0, 2]);
        assert_eq!(inv.search("WEB"), vec![1]);
        assert!(inv.search("").is_empty());
        assert!(inv.search("printer").is_empty());
    }

    #[test]
    fn add_services_unions_and_reports_repeats() {
        let mut inv = Inventory::new(vec![server("dns-1", 1)]);
        let wanted = [Service::Dns, Service::Http].into_iter().collect();
        let merge = inv.add_services(0, &wanted).unwrap();
        assert_eq!(merge.added, vec![Service::Http]);
        assert_eq!(merge.already_present, vec![Service::Dns]);
        assert_eq!(inv.get(0).unwrap().services(), vec![Service::Dns, Service::Http]);

        let merge = inv.add_services(0, &wanted).unwrap();
        assert!(merge.added.is_empty());
        assert_eq!(inv.get(0).unwrap().services().len(), 2);
    }

    #[test]
    fn add_services_rejects_wrong_kinds() {
        let mut inv = Inventory::new(vec![
            server("dns-1", 1),
            Device::new("pc-1", DeviceKind::Pc { ip: IpAssignment::Dhcp }, []),
        ]);
        let routing = [Service::Routing].into_iter().collect();
        assert!(matches!(
            inv.add_services(0, &routing),
            Err(InventoryError::ServiceNotAllowed { .. })
        ));
        assert!(matches!(
            inv.add_services(1, &routing),
            Err(InventoryError::ServicesNotSupported(_))
        ));
        assert_eq!(inv.add_services(7, &routing), Err(InventoryError::NoSuchDevice(8)));
        assert_eq!(inv.service_capable(), vec![0]);
    }

    #[test]
    fn loading_drops_later_duplicates() {
        let inv = Inventory::new(vec![server("web-01", 1), server("WEB-01", 2), server("mail-1", 1), server("dns-1", 3)]);
        let names: Vec<&str> = inv.devices().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["web-01", "dns-1"]);

        let mut inv = Inventory::default();
        let dropped = inv.replace_all(vec![server("web-01", 1), server("web-02", 1)]);
        assert_eq!(inv.len(), 1);
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].name, "web-02");
    }

    #[test]
    fn delete_only_device_empties_list() {
        let mut inv = Inventory::new(vec![server("dns-1", 1)]);
        let removed = inv.delete(0).unwrap();
        assert_eq!(removed.name, "dns-1");
        assert!(inv.is_empty());
        assert_eq!(inv.delete(0), Err(InventoryError::NoSuchDevice(1)));
    }
}
