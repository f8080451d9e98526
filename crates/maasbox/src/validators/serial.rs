//! Serial number validator

use super::Inventory;
use crate::clients::ClientError;
use crate::context::Context;
use maasbox_core::{Device, Discrepancy, Report};
use tracing::{debug, error};

/// Compare the declared serial with the one lshw reported. Machines that
/// reported no serial are not judged.
pub fn compare(device: &Device, reported: Option<&str>) -> Option<Discrepancy> {
    let expected = reported?;
    (device.serial != expected).then(|| Discrepancy::new(&device.serial, expected))
}

pub async fn check(ctx: &Context, inventory: &Inventory) -> Result<Report, ClientError> {
    debug!("Checking serial numbers declared at NetBox");
    let mut report = Report::new();

    for (device, machine) in inventory.pairs() {
        let details = match ctx.maas.machine_details(&machine.system_id).await {
            Ok(details) => details,
            Err(e) => {
                error!(device = %device.name, error = %e, "Failed to fetch machine details");
                continue;
            }
        };
        let serial = details.serial();

        if let Some(discrepancy) = compare(device, serial.as_deref()) {
            debug!(
                device = %device.name,
                netbox = %device.serial,
                maas = ?serial,
                "Serial number mismatch"
            );
            report.insert(device.id, discrepancy);
        }
    }

    Ok(report)
}
