//! Field validators used by the add-device and add-service flows.
//!
//! Every function here is pure: the same input always yields the same result
//! and nothing is printed or logged. Callers surface the error text and
//! re-prompt the same field.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use regex::Regex;

use crate::device::{IpAssignment, Service};
use crate::errors::ValidationError;

pub const NAME_MIN_LEN: usize = 3;
pub const NAME_MAX_LEN: usize = 50;
pub const VLAN_MIN: u16 = 1;
pub const VLAN_MAX: u16 = 4094;

lazy_static::lazy_static! {
    static ref NAME_CHARS: Regex = Regex::new(r"^[A-Za-z0-9 _.\-]+$").unwrap();

    static ref ZERO_NETWORK: Ipv4Network = Ipv4Network::new(Ipv4Addr::new(0, 0, 0, 0), 8).unwrap();
    static ref LOOPBACK: Ipv4Network = Ipv4Network::new(Ipv4Addr::new(127, 0, 0, 0), 8).unwrap();
    static ref MULTICAST: Ipv4Network = Ipv4Network::new(Ipv4Addr::new(224, 0, 0, 0), 4).unwrap();
    static ref RESERVED: Ipv4Network = Ipv4Network::new(Ipv4Addr::new(240, 0, 0, 0), 4).unwrap();
}

/// Parses and checks an IP field.
///
/// An empty value or `N/A` means the device has no address, `DHCP` means a
/// dynamic address. Anything else must be a dotted quad outside the
/// 0/8, loopback, multicast and reserved blocks.
pub fn validate_ip(ip: &str) -> Result<IpAssignment, ValidationError> {
    let ip = ip.trim();
    if ip.is_empty() || ip.eq_ignore_ascii_case("N/A") {
        return Ok(IpAssignment::None);
    }
    if ip.eq_ignore_ascii_case("DHCP") {
        return Ok(IpAssignment::Dhcp);
    }

    let parts: Vec<&str> = ip.split('.').collect();
    if parts.len() != 4 {
        return Err(ValidationError::IpOctetCount);
    }

    let mut octets = [0u8; 4];
    for (slot, part) in octets.iter_mut().zip(&parts) {
        if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::IpOctetInvalid(part.to_string()));
        }
        *slot = part
            .parse::<u8>()
            .map_err(|_| ValidationError::IpOctetInvalid(part.to_string()))?;
    }

    let addr = Ipv4Addr::from(octets);
    if addr.is_broadcast() {
        return Err(ValidationError::IpBroadcast);
    }
    if ZERO_NETWORK.contains(addr) {
        return Err(ValidationError::IpZeroNetwork);
    }
    if LOOPBACK.contains(addr) {
        return Err(ValidationError::IpLoopback);
    }
    if MULTICAST.contains(addr) {
        return Err(ValidationError::IpMulticast);
    }
    if RESERVED.contains(addr) {
        return Err(ValidationError::IpReserved);
    }

    Ok(IpAssignment::Static(addr))
}

/// Checks a device name and returns it trimmed.
pub fn validate_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    let len = name.chars().count();
    if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&len) {
        return Err(ValidationError::NameLength(len));
    }
    if !NAME_CHARS.is_match(name) {
        return Err(ValidationError::NameCharacters);
    }
    Ok(name.to_string())
}

/// Resolves every entry against the service catalogue (case-insensitive).
pub fn validate_services<S: AsRef<str>>(list: &[S]) -> Result<BTreeSet<Service>, ValidationError> {
    list.iter()
        .map(|entry| {
            let entry = entry.as_ref().trim();
            entry
                .parse::<Service>()
                .map_err(|_| ValidationError::UnknownService(entry.to_string()))
        })
        .collect()
}

/// Result of parsing a VLAN list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VlanList {
    /// Sorted, unique VLAN ids.
    pub vlans: Vec<u16>,
    /// Ids that appeared more than once, one entry per repeat.
    pub duplicates: Vec<u16>,
}

/// Parses a comma separated VLAN list.
pub fn validate_vlans(text: &str) -> Result<VlanList, ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(VlanList::default());
    }

    let mut seen = BTreeSet::new();
    let mut duplicates = Vec::new();
    for token in text.split(',').map(str::trim) {
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::VlanNotNumeric(token.to_string()));
        }
        let id = token
            .parse::<u32>()
            .map_err(|_| ValidationError::VlanNotNumeric(token.to_string()))?;
        if id < u32::from(VLAN_MIN) || id > u32::from(VLAN_MAX) {
            return Err(ValidationError::VlanOutOfRange(id));
        }
        let id = id as u16;
        if !seen.insert(id) {
            duplicates.push(id);
        }
    }

    Ok(VlanList {
        vlans: seen.into_iter().collect(),
        duplicates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_accepts_ordinary_addresses() {
        assert_eq!(
            validate_ip("192.168.1.10"),
            Ok(IpAssignment::Static(Ipv4Addr::new(192, 168, 1, 10)))
        );
        assert!(validate_ip("1.0.0.0").is_ok());
        assert!(validate_ip("223.255.255.255").is_ok());
        assert!(validate_ip("10.0.0.255").is_ok());
    }

    #[test]
    fn ip_sentinels() {
        assert_eq!(validate_ip(""), Ok(IpAssignment::None));
        assert_eq!(validate_ip("N/A"), Ok(IpAssignment::None));
        assert_eq!(validate_ip("dhcp"), Ok(IpAssignment::Dhcp));
        assert_eq!(validate_ip("DHCP"), Ok(IpAssignment::Dhcp));
    }

    #[test]
    fn ip_shape_errors() {
        assert_eq!(validate_ip("10.0.0"), Err(ValidationError::IpOctetCount));
        assert_eq!(validate_ip("10.0.0.1.5"), Err(ValidationError::IpOctetCount));
        assert_eq!(
            validate_ip("10.0.0.256"),
            Err(ValidationError::IpOctetInvalid("256".into()))
        );
        assert_eq!(
            validate_ip("10.a.0.1"),
            Err(ValidationError::IpOctetInvalid("a".into()))
        );
        assert_eq!(
            validate_ip("10..0.1"),
            Err(ValidationError::IpOctetInvalid("".into()))
        );
        assert_eq!(
            validate_ip("10.+1.0.1"),
            Err(ValidationError::IpOctetInvalid("+1".into()))
        );
    }

    #[test]
    fn ip_rejects_special_ranges() {
        assert_eq!(validate_ip("0.1.2.3"), Err(ValidationError::IpZeroNetwork));
        assert_eq!(validate_ip("127.0.0.1"), Err(ValidationError::IpLoopback));
        assert_eq!(validate_ip("224.0.0.1"), Err(ValidationError::IpMulticast));
        assert_eq!(validate_ip("239.255.0.1"), Err(ValidationError::IpMulticast));
        assert_eq!(validate_ip("240.0.0.1"), Err(ValidationError::IpReserved));
        assert_eq!(validate_ip("255.0.0.1"), Err(ValidationError::IpReserved));
        assert_eq!(validate_ip("255.255.255.255"), Err(ValidationError::IpBroadcast));
    }

    #[test]
    fn ip_first_octet_sweep() {
        for first in 0u16..=255 {
            let candidate = format!("{first}.10.20.30");
            let rejected = first == 0 || first == 127 || first >= 224;
            assert_eq!(
                validate_ip(&candidate).is_err(),
                rejected,
                "first octet {first}"
            );
        }
    }

    #[test]
    fn name_rules() {
        assert_eq!(validate_name("sw-core.1"), Ok("sw-core.1".to_string()));
        assert_eq!(validate_name("  Core Router_2  "), Ok("Core Router_2".to_string()));
        assert_eq!(validate_name("ab"), Err(ValidationError::NameLength(2)));
        assert_eq!(validate_name("bad@name"), Err(ValidationError::NameCharacters));
        assert_eq!(validate_name(&"x".repeat(50)).map(|n| n.len()), Ok(50));
        assert_eq!(validate_name(&"x".repeat(51)), Err(ValidationError::NameLength(51)));
        assert_eq!(validate_name("   "), Err(ValidationError::NameLength(0)));
    }

    #[test]
    fn services_are_case_insensitive() {
        let set = validate_services(&["dns", "HTTP", " Ssh "]).unwrap();
        assert!(set.contains(&Service::Dns));
        assert!(set.contains(&Service::Http));
        assert!(set.contains(&Service::Ssh));
        assert_eq!(
            validate_services(&["Telepathy"]),
            Err(ValidationError::UnknownService("Telepathy".into()))
        );
        assert!(validate_services::<&str>(&[]).unwrap().is_empty());
    }

    #[test]
    fn vlans_sorted_and_deduplicated() {
        let parsed = validate_vlans("10,20,10,30").unwrap();
        assert_eq!(parsed.vlans, vec![10, 20, 30]);
        assert_eq!(parsed.duplicates, vec![10]);

        let parsed = validate_vlans(" 300 , 1,4094").unwrap();
        assert_eq!(parsed.vlans, vec![1, 300, 4094]);
        assert!(parsed.duplicates.is_empty());
    }

    #[test]
    fn vlan_errors() {
        assert_eq!(validate_vlans("5000"), Err(ValidationError::VlanOutOfRange(5000)));
        assert_eq!(validate_vlans("0"), Err(ValidationError::VlanOutOfRange(0)));
        assert_eq!(
            validate_vlans("10,abc"),
            Err(ValidationError::VlanNotNumeric("abc".into()))
        );
        assert_eq!(
            validate_vlans("10,,20"),
            Err(ValidationError::VlanNotNumeric("".into()))
        );
        assert_eq!(validate_vlans(""), Ok(VlanList::default()));
        assert_eq!(validate_vlans("   ").map(|v| v.vlans), Ok(vec![]));
    }
}
