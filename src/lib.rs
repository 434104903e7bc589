//! # Campus network device inventory
//!
//! A menu-driven console for recording the network devices of each campus:
//! PCs, servers, routers, switches, firewalls and printers, with their
//! addressing, hierarchy layer, services and VLANs.
//!
//! The binary wires these modules together; the library keeps every piece
//! testable without a terminal through the [`console::Console`] trait.

pub mod campus;
pub mod clicommands;
pub mod cliconfig;
pub mod commandcompleter;
pub mod connectivity;
pub mod console;
pub mod device;
pub mod errors;
pub mod execute;
pub mod inventory;
pub mod logging;
pub mod navigation;
pub mod passwd;
pub mod report;
pub mod store;
pub mod validation;

pub use cliconfig::{AppConfig, SessionContext, StorageKind};
pub use device::{Device, DeviceKind, DeviceType, IpAssignment, Layer, Service};
pub use errors::{InventoryError, LoginError, StoreError, ValidationError};
pub use inventory::Inventory;
