//! Device model.
//!
//! `Device` keeps the per-kind fields in `DeviceKind`, so a PC can never
//! carry a layer and a router can never be stored without one. The flat
//! `DeviceRecord` is the persisted shape and converts both ways.

use std::collections::BTreeSet;
use std::fmt;
use std::net::Ipv4Addr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::errors::InventoryError;
use crate::validation::{validate_ip, validate_name, validate_services, validate_vlans};

pub const NOT_APPLICABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter, AsRefStr)]
#[strum(ascii_case_insensitive)]
pub enum DeviceType {
    #[strum(serialize = "PC")]
    Pc,
    Server,
    Router,
    Switch,
    Firewall,
    Printer,
}

impl DeviceType {
    pub fn all() -> Vec<DeviceType> {
        DeviceType::iter().collect()
    }

    /// Whether the type can hold services at all.
    pub fn carries_services(self) -> bool {
        !self.allowed_services().is_empty()
    }

    pub fn carries_layer(self) -> bool {
        matches!(self, DeviceType::Router | DeviceType::Switch)
    }

    pub fn allowed_services(self) -> &'static [Service] {
        match self {
            DeviceType::Server => &[
                Service::Dns,
                Service::Dhcp,
                Service::Http,
                Service::Https,
                Service::Ftp,
                Service::Ssh,
                Service::Database,
                Service::Email,
            ],
            DeviceType::Router => &[
                Service::Routing,
                Service::Nat,
                Service::Dhcp,
                Service::Vpn,
                Service::Qos,
                Service::Ssh,
            ],
            DeviceType::Firewall => &[
                Service::Filtering,
                Service::Nat,
                Service::Vpn,
                Service::Ids,
                Service::Ips,
                Service::Ssh,
            ],
            DeviceType::Pc | DeviceType::Switch | DeviceType::Printer => &[],
        }
    }

    /// Which IP settings the type accepts.
    pub fn accepts_ip(self, ip: &IpAssignment) -> bool {
        match (self, ip) {
            (_, IpAssignment::Static(_)) => true,
            (DeviceType::Pc | DeviceType::Printer, IpAssignment::Dhcp) => true,
            (DeviceType::Switch, IpAssignment::None) => true,
            _ => false,
        }
    }

    /// Hint shown next to the IP prompt.
    pub fn ip_hint(self) -> &'static str {
        match self {
            DeviceType::Pc | DeviceType::Printer => "address or DHCP",
            DeviceType::Switch => "management address, empty for none",
            DeviceType::Server | DeviceType::Router | DeviceType::Firewall => "address",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter, AsRefStr)]
#[strum(ascii_case_insensitive)]
pub enum Layer {
    Core,
    Distribution,
    Access,
    Client,
}

impl Layer {
    pub fn all() -> Vec<Layer> {
        Layer::iter().collect()
    }
}

/// Declaration order is catalogue order: service sets, labels and
/// persisted lists follow it, not the alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter, AsRefStr)]
#[strum(ascii_case_insensitive)]
pub enum Service {
    #[strum(serialize = "DNS")]
    Dns,
    #[strum(serialize = "DHCP")]
    Dhcp,
    #[strum(serialize = "HTTP")]
    Http,
    #[strum(serialize = "HTTPS")]
    Https,
    #[strum(serialize = "FTP")]
    Ftp,
    #[strum(serialize = "SSH")]
    Ssh,
    Database,
    Email,
    Routing,
    #[strum(serialize = "NAT")]
    Nat,
    #[strum(serialize = "VPN")]
    Vpn,
    #[strum(serialize = "QoS")]
    Qos,
    Filtering,
    #[strum(serialize = "IDS")]
    Ids,
    #[strum(serialize = "IPS")]
    Ips,
}

/// How a device obtains its address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpAssignment {
    Static(Ipv4Addr),
    Dhcp,
    None,
}

impl IpAssignment {
    pub fn address(&self) -> Option<Ipv4Addr> {
        match self {
            IpAssignment::Static(addr) => Some(*addr),
            _ => None,
        }
    }
}

impl fmt::Display for IpAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpAssignment::Static(addr) => write!(f, "{}", addr),
            IpAssignment::Dhcp => f.write_str("DHCP"),
            IpAssignment::None => f.write_str(NOT_APPLICABLE),
        }
    }
}

/// Per-kind fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceKind {
    Pc { ip: IpAssignment },
    Server { ip: Ipv4Addr, services: BTreeSet<Service> },
    Router { ip: Ipv4Addr, layer: Layer, services: BTreeSet<Service> },
    Switch { ip: IpAssignment, layer: Layer },
    Firewall { ip: Ipv4Addr, services: BTreeSet<Service> },
    Printer { ip: IpAssignment },
}

impl DeviceKind {
    /// Assembles the kind from loose answers, enforcing the per-type rules.
    pub fn build(
        device_type: DeviceType,
        ip: IpAssignment,
        layer: Option<Layer>,
        services: BTreeSet<Service>,
    ) -> Result<Self, InventoryError> {
        if !device_type.accepts_ip(&ip) {
            return Err(InventoryError::IpNotAllowed {
                kind: device_type.to_string(),
                ip: ip.to_string(),
            });
        }
        check_services(device_type, &services)?;

        let layer = if device_type.carries_layer() {
            Some(layer.ok_or_else(|| InventoryError::LayerRequired(device_type.to_string()))?)
        } else {
            None
        };

        let kind = match (device_type, ip.address(), layer) {
            (DeviceType::Pc, _, _) => DeviceKind::Pc { ip },
            (DeviceType::Printer, _, _) => DeviceKind::Printer { ip },
            (DeviceType::Switch, _, Some(layer)) => DeviceKind::Switch { ip, layer },
            (DeviceType::Server, Some(ip), _) => DeviceKind::Server { ip, services },
            (DeviceType::Firewall, Some(ip), _) => DeviceKind::Firewall { ip, services },
            (DeviceType::Router, Some(ip), Some(layer)) => DeviceKind::Router { ip, layer, services },
            _ => {
                return Err(InventoryError::IpNotAllowed {
                    kind: device_type.to_string(),
                    ip: ip.to_string(),
                })
            }
        };
        Ok(kind)
    }

    pub fn device_type(&self) -> DeviceType {
        match self {
            DeviceKind::Pc { .. } => DeviceType::Pc,
            DeviceKind::Server { .. } => DeviceType::Server,
            DeviceKind::Router { .. } => DeviceType::Router,
            DeviceKind::Switch { .. } => DeviceType::Switch,
            DeviceKind::Firewall { .. } => DeviceType::Firewall,
            DeviceKind::Printer { .. } => DeviceType::Printer,
        }
    }

    pub fn ip(&self) -> IpAssignment {
        match self {
            DeviceKind::Pc { ip } | DeviceKind::Printer { ip } | DeviceKind::Switch { ip, .. } => *ip,
            DeviceKind::Server { ip, .. }
            | DeviceKind::Router { ip, .. }
            | DeviceKind::Firewall { ip, .. } => IpAssignment::Static(*ip),
        }
    }

    pub fn layer(&self) -> Option<Layer> {
        match self {
            DeviceKind::Router { layer, .. } | DeviceKind::Switch { layer, .. } => Some(*layer),
            _ => None,
        }
    }

    pub fn services(&self) -> Option<&BTreeSet<Service>> {
        match self {
            DeviceKind::Server { services, .. }
            | DeviceKind::Router { services, .. }
            | DeviceKind::Firewall { services, .. } => Some(services),
            _ => None,
        }
    }

    pub fn services_mut(&mut self) -> Option<&mut BTreeSet<Service>> {
        match self {
            DeviceKind::Server { services, .. }
            | DeviceKind::Router { services, .. }
            | DeviceKind::Firewall { services, .. } => Some(services),
            _ => None,
        }
    }
}

/// Fails on the first service the type does not allow.
pub fn check_services(device_type: DeviceType, services: &BTreeSet<Service>) -> Result<(), InventoryError> {
    if services.is_empty() {
        return Ok(());
    }
    if !device_type.carries_services() {
        return Err(InventoryError::ServicesNotSupported(device_type.to_string()));
    }
    let allowed = device_type.allowed_services();
    match services.iter().find(|s| !allowed.contains(s)) {
        Some(service) => Err(InventoryError::ServiceNotAllowed {
            service: service.to_string(),
            kind: device_type.to_string(),
        }),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub name: String,
    pub kind: DeviceKind,
    pub vlans: BTreeSet<u16>,
    pub registered_at: DateTime<Local>,
}

impl Device {
    pub fn new(name: impl Into<String>, kind: DeviceKind, vlans: impl IntoIterator<Item = u16>) -> Self {
        Device {
            name: name.into(),
            kind,
            vlans: vlans.into_iter().collect(),
            registered_at: Local::now(),
        }
    }

    pub fn device_type(&self) -> DeviceType {
        self.kind.device_type()
    }

    pub fn ip(&self) -> IpAssignment {
        self.kind.ip()
    }

    pub fn services(&self) -> Vec<Service> {
        self.kind
            .services()
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn layer_label(&self) -> String {
        self.kind
            .layer()
            .map(|l| l.to_string())
            .unwrap_or_else(|| NOT_APPLICABLE.to_string())
    }

    pub fn services_label(&self) -> String {
        let services = self.services();
        if services.is_empty() {
            NOT_APPLICABLE.to_string()
        } else {
            services.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(", ")
        }
    }

    pub fn vlans_label(&self) -> String {
        if self.vlans.is_empty() {
            NOT_APPLICABLE.to_string()
        } else {
            self.vlans.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
        }
    }
}

/// Persisted shape of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    #[serde(rename = "type")]
    pub device_type: String,
    pub name: String,
    #[serde(default = "not_applicable")]
    pub ip: String,
    #[serde(default = "not_applicable")]
    pub layer: String,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub vlans: Vec<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_timestamp: Option<DateTime<Local>>,
}

fn not_applicable() -> String {
    NOT_APPLICABLE.to_string()
}

impl From<&Device> for DeviceRecord {
    fn from(device: &Device) -> Self {
        DeviceRecord {
            device_type: device.device_type().to_string(),
            name: device.name.clone(),
            ip: device.ip().to_string(),
            layer: device.layer_label(),
            services: device.services().iter().map(|s| s.to_string()).collect(),
            vlans: device.vlans.iter().copied().collect(),
            registration_timestamp: Some(device.registered_at),
        }
    }
}

impl TryFrom<DeviceRecord> for Device {
    type Error = InventoryError;

    fn try_from(record: DeviceRecord) -> Result<Self, Self::Error> {
        let device_type: DeviceType = record
            .device_type
            .trim()
            .parse()
            .map_err(|_| InventoryError::InvalidRecord(format!("unknown device type '{}'", record.device_type)))?;
        let name = validate_name(&record.name)?;
        let ip = validate_ip(&record.ip)?;

        let layer = match record.layer.trim() {
            "" | NOT_APPLICABLE => None,
            other => Some(
                other
                    .parse::<Layer>()
                    .map_err(|_| InventoryError::InvalidRecord(format!("unknown layer '{}'", other)))?,
            ),
        };
        let services = validate_services(&record.services)?;

        let vlan_text = record
            .vlans
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let vlans = validate_vlans(&vlan_text)?;

        let kind = DeviceKind::build(device_type, ip, layer, services)?;
        Ok(Device {
            name,
            kind,
            vlans: vlans.vlans.into_iter().collect(),
            registered_at: record.registration_timestamp.unwrap_or_else(Local::now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn router() -> Device {
        let kind = DeviceKind::build(
            DeviceType::Router,
            IpAssignment::Static(Ipv4Addr::new(10, 0, 0, 1)),
            Some(Layer::Core),
            [Service::Routing, Service::Nat].into_iter().collect(),
        )
        .unwrap();
        Device::new("core-rtr-1", kind, [20, 10])
    }

    #[test]
    fn router_record_shape() {
        let record = DeviceRecord::from(&router());
        assert_eq!(record.device_type, "Router");
        assert_eq!(record.ip, "10.0.0.1");
        assert_eq!(record.layer, "Core");
        assert_eq!(record.services, vec!["Routing".to_string(), "NAT".to_string()]);
        assert_eq!(record.vlans, vec![10, 20]);
    }

    #[test]
    fn record_json_uses_type_key() {
        let json = serde_json::to_value(DeviceRecord::from(&router())).unwrap();
        assert_eq!(json["type"], "Router");
        assert!(json.get("registration_timestamp").is_some());
    }

    #[test]
    fn record_converts_back() {
        let original = router();
        let restored = Device::try_from(DeviceRecord::from(&original)).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn pc_without_layer_reports_na() {
        let pc = Device::new("desk-01", DeviceKind::Pc { ip: IpAssignment::Dhcp }, []);
        let record = DeviceRecord::from(&pc);
        assert_eq!(record.ip, "DHCP");
        assert_eq!(record.layer, "N/A");
        assert!(record.services.is_empty());
        assert_eq!(pc.services_label(), "N/A");
    }

    #[test]
    fn build_enforces_kind_rules() {
        let none = BTreeSet::new();
        assert!(matches!(
            DeviceKind::build(DeviceType::Server, IpAssignment::Dhcp, None, none.clone()),
            Err(InventoryError::IpNotAllowed { .. })
        ));
        assert!(matches!(
            DeviceKind::build(DeviceType::Switch, IpAssignment::None, None, none.clone()),
            Err(InventoryError::LayerRequired(_))
        ));
        assert!(DeviceKind::build(DeviceType::Switch, IpAssignment::None, Some(Layer::Access), none.clone()).is_ok());

        let web: BTreeSet<Service> = [Service::Http].into_iter().collect();
        assert!(matches!(
            DeviceKind::build(
                DeviceType::Router,
                IpAssignment::Static(Ipv4Addr::new(10, 1, 1, 1)),
                Some(Layer::Core),
                web.clone()
            ),
            Err(InventoryError::ServiceNotAllowed { .. })
        ));
        assert!(matches!(
            DeviceKind::build(DeviceType::Printer, IpAssignment::Dhcp, None, web),
            Err(InventoryError::ServicesNotSupported(_))
        ));
    }

    #[test]
    fn layer_ignored_for_types_without_one() {
        let kind = DeviceKind::build(DeviceType::Pc, IpAssignment::Dhcp, Some(Layer::Core), BTreeSet::new()).unwrap();
        assert_eq!(kind.layer(), None);
    }

    #[test]
    fn record_with_bad_type_is_rejected() {
        let mut record = DeviceRecord::from(&router());
        record.device_type = "Toaster".into();
        assert!(matches!(Device::try_from(record), Err(InventoryError::InvalidRecord(_))));
    }

    #[test]
    fn type_names_parse_case_insensitively() {
        assert_eq!("pc".parse::<DeviceType>().unwrap(), DeviceType::Pc);
        assert_eq!("FIREWALL".parse::<DeviceType>().unwrap(), DeviceType::Firewall);
        assert_eq!("qos".parse::<Service>().unwrap(), Service::Qos);
        assert_eq!(DeviceType::Pc.to_string(), "PC");
    }
}
