//! Core shared types and parsers for maasbox
//!
//! This crate contains the NetBox and MaaS inventory models, the parsers for
//! the hardware details MaaS collects during commissioning (lshw, LLDP) and
//! for IPMI tool output, and the mappings between the two systems.
//!
//! Nothing in here performs I/O.

pub mod cabling;
pub mod firmware;
pub mod lldp;
pub mod lshw;
pub mod maas;
pub mod mac;
pub mod netbox;
pub mod report;
pub mod status;

pub use maas::{InterfaceKind, Machine, MachineInterface, NodeStatus};
pub use netbox::{Cable, Choice, Device, Interface, IpAddress, Platform, Vlan};
pub use report::{Discrepancy, Report};

use thiserror::Error;

/// Failure to read a hardware-detail document collected by MaaS.
#[derive(Debug, Error)]
pub enum DetailsError {
    #[error("malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),
}
