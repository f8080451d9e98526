//! IPMI tool output parsing
//!
//! `ipmitool` prints most reports as aligned `Key : Value` lines. The
//! `mc getsysinfo system_fw_version` query prints the bare version string.

use macaddr::MacAddr6;
use std::collections::BTreeMap;

/// Device custom field holding the BMC firmware version.
pub const BMC_FIELD: &str = "BMC";
/// Device custom field holding the system (BIOS) firmware version.
pub const BIOS_FIELD: &str = "BIOS";

/// Value of the first `key : value` line whose key matches.
pub fn field<'a>(output: &'a str, key: &str) -> Option<&'a str> {
    output.lines().find_map(|line| {
        let (k, v) = line.split_once(':')?;
        (k.trim() == key).then(|| v.trim()).filter(|v| !v.is_empty())
    })
}

/// Firmware versions keyed by NetBox custom field name.
///
/// `mc_info` is the output of `ipmitool mc info`, `system_fw` the output of
/// `ipmitool mc getsysinfo system_fw_version`. Versions that could not be
/// read are omitted.
pub fn parse_firmware_versions(mc_info: &str, system_fw: &str) -> BTreeMap<String, String> {
    let mut versions = BTreeMap::new();

    if let Some(bmc) = field(mc_info, "Firmware Revision") {
        versions.insert(BMC_FIELD.to_string(), bmc.to_string());
    }

    let bios = system_fw.trim();
    if !bios.is_empty() && !bios.contains('\n') {
        versions.insert(BIOS_FIELD.to_string(), bios.to_string());
    }

    versions
}

/// BMC MAC address from `ipmitool lan print`.
///
/// Values on these lines contain colons themselves, so only the first
/// separator splits key from value.
pub fn parse_lan_mac(lan_print: &str) -> Option<MacAddr6> {
    field(lan_print, "MAC Address")?.parse().ok()
}
