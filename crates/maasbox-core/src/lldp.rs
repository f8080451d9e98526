//! LLDP neighbour details
//!
//! MaaS keeps the `lldpctl -f xml` output captured during commissioning. Each
//! `<interface>` describes the switch port a machine NIC is cabled to.

use crate::cabling::cable_color;
use crate::DetailsError;
use roxmltree::{Document, Node};
use serde::Serialize;

/// Where a machine interface is plugged in, as seen over LLDP.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SwitchConnection {
    /// Machine interface name.
    pub name: String,
    /// Switch system name.
    pub switch_name: String,
    /// Switch port identifier.
    pub switch_port: String,
    /// Untagged VLAN on the switch port.
    pub vid: u16,
    /// Cable colour as NetBox hex, from the port description.
    pub cable_color: Option<String>,
}

/// Parse LLDP neighbours. Interfaces lacking chassis, port or VLAN
/// information are skipped.
pub fn switch_connections(xml: &str) -> Result<Vec<SwitchConnection>, DetailsError> {
    let doc = Document::parse(xml)?;

    Ok(doc
        .root_element()
        .children()
        .filter(|n| n.has_tag_name("interface"))
        .filter_map(parse_interface)
        .collect())
}

fn parse_interface(iface: Node<'_, '_>) -> Option<SwitchConnection> {
    let name = iface.attribute("name")?.to_string();
    let switch_name = path_text(iface, &["chassis", "name"])?.to_string();
    let switch_port = path_text(iface, &["port", "id"])?.to_string();
    let vid = iface
        .children()
        .find(|c| c.has_tag_name("vlan"))?
        .attribute("vlan-id")?
        .trim()
        .parse()
        .ok()?;
    let cable_color = path_text(iface, &["port", "descr"])
        .and_then(cable_color)
        .map(str::to_string);

    Some(SwitchConnection {
        name,
        switch_name,
        switch_port,
        vid,
        cable_color,
    })
}

fn path_text<'a>(node: Node<'a, '_>, path: &[&str]) -> Option<&'a str> {
    let mut current = node;
    for tag in path {
        current = current.children().find(|c| c.has_tag_name(*tag))?;
    }
    current.text().map(str::trim).filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LLDP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<lldp label="LLDP neighbors">
 <interface label="Interface" name="eno1" via="LLDP" rid="1" age="0 day, 00:10:00">
  <chassis label="Chassis">
   <id label="ChassisID" type="mac">00:1c:73:aa:bb:cc</id>
   <name label="SysName">sw-lar01</name>
  </chassis>
  <port label="Port">
   <id label="PortID" type="ifname">Ethernet12</id>
   <descr label="PortDescr">lar0101 eno1 (rack 1 port: red)</descr>
  </port>
  <vlan label="VLAN" vlan-id="100" pvid="yes">v100</vlan>
 </interface>
 <interface label="Interface" name="eno2" via="LLDP" rid="2">
  <chassis label="Chassis">
   <name label="SysName">sw-lar02</name>
  </chassis>
  <port label="Port">
   <id label="PortID" type="ifname">Ethernet12</id>
   <descr label="PortDescr">no colour here</descr>
  </port>
  <vlan label="VLAN" vlan-id="100" pvid="yes">v100</vlan>
 </interface>
 <interface label="Interface" name="eno3" via="LLDP" rid="3">
  <port label="Port"><id label="PortID" type="ifname">Ethernet13</id></port>
 </interface>
</lldp>"#;

    #[test]
    fn test_switch_connections() {
        let conns = switch_connections(LLDP).unwrap();
        assert_eq!(conns.len(), 2);

        assert_eq!(
            conns[0],
            SwitchConnection {
                name: "eno1".to_string(),
                switch_name: "sw-lar01".to_string(),
                switch_port: "Ethernet12".to_string(),
                vid: 100,
                cable_color: Some("f44336".to_string()),
            }
        );
        assert_eq!(conns[1].switch_name, "sw-lar02");
        assert_eq!(conns[1].cable_color, None);
    }

    #[test]
    fn test_empty_and_malformed() {
        assert!(switch_connections("<lldp/>").unwrap().is_empty());
        assert!(switch_connections("<lldp>").is_err());
    }
}
