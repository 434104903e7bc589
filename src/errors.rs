use thiserror::Error;

/// Rule violations reported by the field validators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("IP address must have exactly 4 octets separated by dots")]
    IpOctetCount,

    #[error("IP octet '{0}' is not a number between 0 and 255")]
    IpOctetInvalid(String),

    #[error("IP address cannot start with 0")]
    IpZeroNetwork,

    #[error("IP address cannot be a loopback address (127.x.x.x)")]
    IpLoopback,

    #[error("IP address cannot be a multicast address (224-239.x.x.x)")]
    IpMulticast,

    #[error("IP address cannot be in the reserved range (240-255.x.x.x)")]
    IpReserved,

    #[error("IP address cannot be the broadcast address 255.255.255.255")]
    IpBroadcast,

    #[error("name must be between 3 and 50 characters (got {0})")]
    NameLength(usize),

    #[error("name may only contain letters, digits, spaces, hyphens, dots and underscores")]
    NameCharacters,

    #[error("unknown service '{0}'")]
    UnknownService(String),

    #[error("VLAN '{0}' is not a number")]
    VlanNotNumeric(String),

    #[error("VLAN {0} is out of range (1-4094)")]
    VlanOutOfRange(u32),
}

/// Failures of inventory mutations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("a device named '{0}' already exists")]
    DuplicateName(String),

    #[error("IP address {0} is already assigned to '{1}'")]
    DuplicateIp(String, String),

    #[error("device #{0} does not exist")]
    NoSuchDevice(usize),

    #[error("{0} devices do not carry services")]
    ServicesNotSupported(String),

    #[error("service {service} is not allowed on a {kind}")]
    ServiceNotAllowed { service: String, kind: String },

    #[error("{kind} cannot use IP setting '{ip}'")]
    IpNotAllowed { kind: String, ip: String },

    #[error("{0} devices require a layer")]
    LayerRequired(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Persistence failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed data in {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("no campus selected")]
    NoCampus,
}

impl StoreError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// Login failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    #[error("too many failed login attempts ({0})")]
    TooManyAttempts(u32),

    #[error("login aborted")]
    Aborted,
}
