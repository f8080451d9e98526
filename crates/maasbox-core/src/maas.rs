//! MaaS models
//!
//! Machines as returned by the MaaS 2.0 API `machines` endpoint. Only the
//! fields maasbox compares or copies into NetBox are modelled.

use crate::netbox::null_as_default;
use serde::{Deserialize, Serialize};
use strum::Display;

/// MaaS node lifecycle status, transported as its numeric code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, Display)]
#[serde(try_from = "u8", into = "u8")]
#[strum(serialize_all = "title_case")]
pub enum NodeStatus {
    /// Also reported as DEFAULT.
    New,
    Commissioning,
    FailedCommissioning,
    Missing,
    Ready,
    Reserved,
    Deployed,
    Retired,
    Broken,
    Deploying,
    Allocated,
    FailedDeployment,
    Releasing,
    FailedReleasing,
    DiskErasing,
    FailedDiskErasing,
    RescueMode,
    EnteringRescueMode,
    FailedEnteringRescueMode,
    ExitingRescueMode,
    FailedExitingRescueMode,
    Testing,
    FailedTesting,
}

impl NodeStatus {
    const ALL: [NodeStatus; 23] = [
        NodeStatus::New,
        NodeStatus::Commissioning,
        NodeStatus::FailedCommissioning,
        NodeStatus::Missing,
        NodeStatus::Ready,
        NodeStatus::Reserved,
        NodeStatus::Deployed,
        NodeStatus::Retired,
        NodeStatus::Broken,
        NodeStatus::Deploying,
        NodeStatus::Allocated,
        NodeStatus::FailedDeployment,
        NodeStatus::Releasing,
        NodeStatus::FailedReleasing,
        NodeStatus::DiskErasing,
        NodeStatus::FailedDiskErasing,
        NodeStatus::RescueMode,
        NodeStatus::EnteringRescueMode,
        NodeStatus::FailedEnteringRescueMode,
        NodeStatus::ExitingRescueMode,
        NodeStatus::FailedExitingRescueMode,
        NodeStatus::Testing,
        NodeStatus::FailedTesting,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Deployed or ready machines are the only ones whose inventory is
    /// trusted for reconciliation.
    pub fn is_settled(self) -> bool {
        matches!(self, NodeStatus::Deployed | NodeStatus::Ready)
    }
}

impl TryFrom<u8> for NodeStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(value))
            .copied()
            .ok_or_else(|| format!("unknown MaaS node status {value}"))
    }
}

impl From<NodeStatus> for u8 {
    fn from(status: NodeStatus) -> Self {
        status.code()
    }
}

/// MaaS interface type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InterfaceKind {
    Physical,
    Bond,
    Vlan,
    Bridge,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InterfaceVlan {
    pub vid: u16,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Subnet {
    #[serde(default)]
    pub cidr: Option<String>,
}

/// An address assignment on an interface.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Link {
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub subnet: Option<Subnet>,
}

/// A machine network interface as configured in MaaS.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MachineInterface {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: InterfaceKind,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mac_address: String,
    #[serde(default)]
    pub effective_mtu: Option<u32>,
    #[serde(default)]
    pub vlan: Option<InterfaceVlan>,
    /// Names of the parent interfaces (bond members, VLAN base, bridge port).
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl MachineInterface {
    /// VLAN id of the interface, 0 when untagged.
    pub fn vid(&self) -> u16 {
        self.vlan.as_ref().map(|v| v.vid).unwrap_or(0)
    }

    /// Whether traffic on this interface is 802.1Q tagged.
    pub fn is_tagged(&self) -> bool {
        self.vid() != 0
    }

    /// Address of the first link, without prefix length.
    pub fn first_address(&self) -> Option<&str> {
        self.links
            .first()
            .and_then(|l| l.ip_address.as_deref())
            .filter(|a| !a.is_empty())
    }

    /// Address of the first link in `a.b.c.d/nn` form. The prefix length is
    /// taken from the link's subnet; without one the bare address is returned.
    pub fn ipv4_with_prefix(&self) -> Option<String> {
        let address = self.first_address()?;
        let prefix = self
            .links
            .first()
            .and_then(|l| l.subnet.as_ref())
            .and_then(|s| s.cidr.as_deref())
            .and_then(|cidr| cidr.rsplit_once('/'))
            .map(|(_, len)| len)
            .filter(|len| !len.is_empty());

        Some(match prefix {
            Some(len) => format!("{address}/{len}"),
            None => address.to_string(),
        })
    }
}

/// A machine known to MaaS.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Machine {
    pub system_id: String,
    pub hostname: String,
    pub status: NodeStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub osystem: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub distro_series: String,
    #[serde(default)]
    pub power_state: Option<String>,
    #[serde(default)]
    pub interface_set: Vec<MachineInterface>,
}

impl Machine {
    /// Lower-cased hostname, the key used to match NetBox device names.
    pub fn key(&self) -> String {
        self.hostname.to_lowercase()
    }

    pub fn interface(&self, name: &str) -> Option<&MachineInterface> {
        self.interface_set.iter().find(|i| i.name == name)
    }

    /// Deployed OS as a NetBox platform slug, e.g. `ubuntu-bionic`.
    pub fn platform(&self) -> Option<String> {
        if self.osystem.is_empty() || self.distro_series.is_empty() {
            None
        } else {
            Some(format!("{}-{}", self.osystem, self.distro_series))
        }
    }
}
