//! NetBox models
//!
//! Read models for the DCIM/IPAM objects maasbox reconciles, plus the typed
//! write payloads used for PATCH and POST requests. Field names follow the
//! NetBox 2.x REST API.

use crate::mac;
use macaddr::MacAddr6;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Legacy numeric choice codes accepted by the NetBox 2.x API.
pub mod codes {
    /// Interface 802.1Q mode: access.
    pub const MODE_ACCESS: u16 = 100;
    /// Interface 802.1Q mode: tagged.
    pub const MODE_TAGGED: u16 = 200;
    /// Interface type: link aggregation group.
    pub const TYPE_LAG: u16 = 200;
    /// Interface type: other. Used for VLAN and bridge interfaces.
    pub const TYPE_OTHER: u16 = 32767;
    /// IP address status: active.
    pub const IP_STATUS_ACTIVE: u8 = 1;
    /// Default MTU for management interfaces.
    pub const MGMT_MTU: u32 = 1500;
    /// Cable termination type for device interfaces.
    pub const TERMINATION_INTERFACE: &str = "dcim.interface";
}

/// Name of the device custom field holding the IPMI web location.
pub const IPMI_FIELD: &str = "IPMI";

pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A NetBox list response.
#[derive(Clone, Debug, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub count: Option<u64>,
    /// Absolute URL of the next page, if any.
    #[serde(default)]
    pub next: Option<String>,
    pub results: Vec<T>,
}

/// A `{value, label}` pair as returned for choice fields and by the
/// `_choices` endpoints.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Choice {
    pub value: Value,
    pub label: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct NestedIpAddress {
    pub id: i64,
    pub address: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct NestedPlatform {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    pub slug: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct NestedVlan {
    pub id: i64,
    pub vid: u16,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct NestedInterface {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

/// A DCIM device: a server or a switch.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Device {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub serial: String,
    #[serde(default)]
    pub status: Option<Choice>,
    #[serde(default)]
    pub primary_ip4: Option<NestedIpAddress>,
    #[serde(default)]
    pub platform: Option<NestedPlatform>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub custom_fields: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comments: String,
}

impl Device {
    pub fn status_label(&self) -> Option<&str> {
        self.status.as_ref().map(|s| s.label.as_str())
    }

    /// Primary IPv4 address with the prefix length stripped.
    pub fn primary_ipv4_address(&self) -> Option<&str> {
        self.primary_ip4
            .as_ref()
            .map(|ip| ip.address.split('/').next().unwrap_or(&ip.address))
    }

    pub fn platform_slug(&self) -> Option<&str> {
        self.platform.as_ref().map(|p| p.slug.as_str())
    }

    /// A custom field's value when it is a non-empty string.
    pub fn custom_field_str(&self, name: &str) -> Option<&str> {
        self.custom_fields
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// The declared IPMI web location, if any.
    pub fn ipmi_location(&self) -> Option<&str> {
        self.custom_field_str(IPMI_FIELD)
    }
}

/// A DCIM interface.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Interface {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, with = "mac::option_string")]
    pub mac_address: Option<MacAddr6>,
    #[serde(default)]
    pub mgmt_only: bool,
    #[serde(default)]
    pub untagged_vlan: Option<NestedVlan>,
    #[serde(default)]
    pub lag: Option<NestedInterface>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub mtu: Option<u32>,
}

fn default_enabled() -> bool {
    true
}

/// A DCIM cable between two interface terminations.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Cable {
    pub id: i64,
    #[serde(default)]
    pub termination_a_id: Option<i64>,
    #[serde(default)]
    pub termination_b_id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub color: String,
}

impl Cable {
    /// Whether this cable joins the two terminations, in either orientation.
    pub fn connects(&self, a: i64, b: i64) -> bool {
        let ends = (self.termination_a_id, self.termination_b_id);
        ends == (Some(a), Some(b)) || ends == (Some(b), Some(a))
    }

    /// Cable colour, `None` when unset.
    pub fn color(&self) -> Option<&str> {
        Some(self.color.as_str()).filter(|c| !c.is_empty())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Vlan {
    pub id: i64,
    pub vid: u16,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct IpAddress {
    pub id: i64,
    pub address: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Platform {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    pub slug: String,
}

/// Response body of a POST, only the id is used.
#[derive(Clone, Debug, Deserialize)]
pub struct Created {
    pub id: i64,
}

/// Partial update of a device. Unset fields are left untouched.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct DevicePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_ip4: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<Map<String, Value>>,
}

/// Partial update of an interface. Unset fields are left untouched.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct InterfacePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_option_mac"
    )]
    pub mac_address: Option<MacAddr6>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tagged_vlans: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub untagged_vlan: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lag: Option<i64>,
}

fn serialize_option_mac<S>(mac: &Option<MacAddr6>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    mac::option_string::serialize(mac, serializer)
}

/// A new interface.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct NewInterface {
    pub device: i64,
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_option_mac"
    )]
    pub mac_address: Option<MacAddr6>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mgmt_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<u16>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tagged_vlans: Vec<i64>,
}

impl NewInterface {
    pub fn named(device: i64, name: impl Into<String>) -> Self {
        Self {
            device,
            name: name.into(),
            kind: None,
            enabled: None,
            mtu: None,
            mac_address: None,
            mgmt_only: None,
            mode: None,
            tagged_vlans: Vec::new(),
        }
    }
}

/// A new IP address bound to an interface.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct NewIpAddress {
    /// Address with prefix length, e.g. `10.0.0.5/24`.
    pub address: String,
    pub status: u8,
    pub interface: i64,
}

/// A new cable between two interfaces.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct NewCable {
    pub termination_a_type: &'static str,
    pub termination_a_id: i64,
    pub termination_b_type: &'static str,
    pub termination_b_id: i64,
    pub status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl NewCable {
    /// Connected cable between two interfaces.
    pub fn between(interface: i64, switch_port: i64, color: Option<String>) -> Self {
        Self {
            termination_a_type: codes::TERMINATION_INTERFACE,
            termination_a_id: interface,
            termination_b_type: codes::TERMINATION_INTERFACE,
            termination_b_id: switch_port,
            status: true,
            color,
        }
    }
}
