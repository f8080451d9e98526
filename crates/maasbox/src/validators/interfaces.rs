//! Interface inventory validator
//!
//! Finds network interfaces lshw discovered on a machine that NetBox does
//! not know about. An interface counts as known when NetBox has one with the
//! same name and MAC address, or just the same name when lshw reported no
//! MAC.

use super::Inventory;
use crate::clients::ClientError;
use crate::context::Context;
use maasbox_core::lshw::DiscoveredInterface;
use maasbox_core::{Discrepancy, Interface, Report};
use serde_json::json;
use tracing::{debug, error};

pub fn missing(discovered: Vec<DiscoveredInterface>, declared: &[Interface]) -> Vec<DiscoveredInterface> {
    discovered
        .into_iter()
        .filter(|iface| {
            !declared.iter().any(|d| {
                d.name == iface.name
                    && (iface.mac_address.is_none() || d.mac_address == iface.mac_address)
            })
        })
        .collect()
}

pub async fn check(ctx: &Context, inventory: &Inventory) -> Result<Report, ClientError> {
    debug!("Checking for interfaces missing from NetBox");
    let mut report = Report::new();

    for (device, machine) in inventory.pairs() {
        let details = match ctx.maas.machine_details(&machine.system_id).await {
            Ok(details) => details,
            Err(e) => {
                error!(device = %device.name, error = %e, "Failed to fetch machine details");
                continue;
            }
        };
        let declared = match ctx.netbox.interfaces(device.id, None).await {
            Ok(declared) => declared,
            Err(e) => {
                error!(device = %device.name, error = %e, "Failed to fetch NetBox interfaces");
                continue;
            }
        };
        let missing = missing(details.interfaces(), &declared);

        for iface in &missing {
            error!(
                device = %device.name,
                interface = %iface.name,
                mac_address = ?iface.mac_address,
                form_factor = ?iface.form_factor,
                "Missing interface"
            );
        }
        if !missing.is_empty() {
            report.insert(device.id, Discrepancy::new(json!([]), &missing));
        }
    }

    Ok(report)
}
