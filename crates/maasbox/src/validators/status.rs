//! Status validator

use super::Inventory;
use maasbox_core::status::netbox_status;
use maasbox_core::{Device, Discrepancy, Machine, Report};
use tracing::debug;

/// Compare the device status label with the one its MaaS state maps to.
/// Transitional MaaS states are never a mismatch.
pub fn compare(device: &Device, machine: &Machine) -> Option<Discrepancy> {
    let expected = netbox_status(machine.status)?;
    let current = device.status_label();
    (current != Some(expected)).then(|| Discrepancy::new(current, expected))
}

pub fn check(inventory: &Inventory) -> Report {
    debug!("Checking NetBox status against MaaS");

    inventory
        .pairs()
        .filter_map(|(device, machine)| {
            let discrepancy = compare(device, machine)?;
            debug!(
                device = %device.name,
                netbox = ?device.status_label(),
                maas = %machine.status,
                "Status mismatch"
            );
            Some((device.id, discrepancy))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use serde_json::json;

    fn device(label: &str) -> Device {
        serde_json::from_value(json!({
            "id": 1,
            "name": "LAR0101",
            "status": {"value": 1, "label": label}
        }))
        .unwrap()
    }

    fn machine(status: u8) -> Machine {
        serde_json::from_value(crate::testing::machine("lar0101", status)).unwrap()
    }

    #[test]
    fn test_compare() {
        assert_eq!(compare(&device("Active"), &machine(6)), None);

        let d = compare(&device("Active"), &machine(4)).unwrap();
        assert_eq!(d.current, json!("Active"));
        assert_eq!(d.expected, json!("Offline"));

        // Deploying has no NetBox equivalent
        assert_eq!(compare(&device("Offline"), &machine(9)), None);
    }

    #[test]
    fn test_check_uses_settled_machines_only() {
        let inventory = Inventory::new(
            vec![device("Planned")],
            vec![machine(9)],
            &FilterConfig::default(),
        );
        assert!(check(&inventory).is_empty());

        let inventory = Inventory::new(
            vec![device("Planned")],
            vec![machine(6)],
            &FilterConfig::default(),
        );
        let report = check(&inventory);
        assert_eq!(report[&1].expected_str(), Some("Active"));
    }
}
