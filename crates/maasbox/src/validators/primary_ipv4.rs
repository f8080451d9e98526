//! Primary IPv4 validator

use super::Inventory;
use maasbox_core::{Device, Discrepancy, Machine, Report};
use tracing::debug;

/// Compare the device's primary IPv4 (without prefix length) with the first
/// address on the machine's primary interface. Machines without such an
/// address are not judged.
pub fn compare(device: &Device, machine: &Machine, primary_interface: &str) -> Option<Discrepancy> {
    let expected = machine.interface(primary_interface)?.first_address()?;
    let current = device.primary_ipv4_address();
    (current != Some(expected)).then(|| Discrepancy::new(current, expected))
}

pub fn check(inventory: &Inventory, primary_interface: &str) -> Report {
    debug!(interface = primary_interface, "Checking primary IPv4 addresses declared at NetBox");

    inventory
        .pairs()
        .filter_map(|(device, machine)| {
            let discrepancy = compare(device, machine, primary_interface)?;
            debug!(
                device = %device.name,
                declared = ?device.primary_ipv4_address(),
                actual = %discrepancy.expected,
                "Primary IPv4 mismatch"
            );
            Some((device.id, discrepancy))
        })
        .collect()
}
