//! lshw hardware details
//!
//! MaaS stores the XML output of `lshw -xml` gathered during commissioning.
//! The document root is either a `<list>` wrapping the system node or the
//! system node itself.

use crate::{mac, DetailsError};
use macaddr::MacAddr6;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

/// A network interface discovered by lshw.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredInterface {
    pub name: String,
    /// `None` when lshw reports no serial or one that is not a 6-octet MAC,
    /// as with InfiniBand GUIDs.
    #[serde(
        default,
        with = "mac::option_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub mac_address: Option<MacAddr6>,
    /// NetBox interface type derived from the kernel driver.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub form_factor: Option<u16>,
}

/// NetBox legacy interface type for a NIC driver.
pub fn form_factor_for_driver(driver: &str) -> Option<u16> {
    match driver {
        // 1000BASE-T
        "igb" => Some(1000),
        // 10GBASE-T
        "ixgbe" => Some(1150),
        _ => None,
    }
}

/// Parsed lshw document.
pub struct HardwareDetails<'a> {
    doc: Document<'a>,
}

impl<'a> HardwareDetails<'a> {
    pub fn parse(xml: &'a str) -> Result<Self, DetailsError> {
        Ok(Self {
            doc: Document::parse(xml)?,
        })
    }

    fn system(&self) -> Option<Node<'_, 'a>> {
        let root = self.doc.root_element();
        if is_class(root, "system") {
            return Some(root);
        }
        root.children().find(|n| is_class(*n, "system"))
    }

    /// Serial number of the system board.
    pub fn system_serial(&self) -> Option<String> {
        let system = self.system()?;
        child_text(system, "serial").map(str::to_string)
    }

    /// Network interfaces with a logical name.
    pub fn network_interfaces(&self) -> Vec<DiscoveredInterface> {
        let Some(system) = self.system() else {
            return Vec::new();
        };

        system
            .descendants()
            .filter(|n| is_class(*n, "network"))
            .filter_map(|n| {
                let name = child_text(n, "logicalname")?;
                let mac_address = child_text(n, "serial").and_then(|s| s.parse().ok());
                let form_factor = n
                    .children()
                    .find(|c| c.has_tag_name("configuration"))
                    .and_then(|conf| {
                        conf.children().find(|s| {
                            s.has_tag_name("setting") && s.attribute("id") == Some("driver")
                        })
                    })
                    .and_then(|s| s.attribute("value"))
                    .and_then(form_factor_for_driver);

                Some(DiscoveredInterface {
                    name: name.to_string(),
                    mac_address,
                    form_factor,
                })
            })
            .collect()
    }
}

fn is_class(node: Node<'_, '_>, class: &str) -> bool {
    node.has_tag_name("node") && node.attribute("class") == Some(class)
}

fn child_text<'a>(node: Node<'a, '_>, tag: &str) -> Option<&'a str> {
    node.children()
        .find(|c| c.has_tag_name(tag))
        .and_then(|c| c.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
