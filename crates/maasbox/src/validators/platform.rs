//! Platform validator

use super::Inventory;
use maasbox_core::{Device, Discrepancy, Machine, Report};
use tracing::debug;

/// Compare the platform slug with `<osystem>-<distro_series>`.
pub fn compare(device: &Device, machine: &Machine) -> Option<Discrepancy> {
    let expected = machine.platform();
    let current = device.platform_slug();
    (current != expected.as_deref()).then(|| Discrepancy::new(current, expected))
}

pub fn check(inventory: &Inventory) -> Report {
    debug!("Checking platforms declared at NetBox");

    inventory
        .pairs()
        .filter_map(|(device, machine)| {
            let discrepancy = compare(device, machine)?;
            debug!(
                device = %device.name,
                declared = ?device.platform_slug(),
                expected = %discrepancy.expected,
                "Platform mismatch"
            );
            Some((device.id, discrepancy))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compare() {
        let device: Device = serde_json::from_value(json!({
            "id": 1,
            "name": "LAR0101",
            "platform": {"id": 4, "name": "Ubuntu Bionic", "slug": "ubuntu-bionic"}
        }))
        .unwrap();
        let deployed: Machine =
            serde_json::from_value(crate::testing::machine("lar0101", 6)).unwrap();
        assert_eq!(compare(&device, &deployed), None);

        let mut ready = deployed.clone();
        ready.osystem.clear();
        let d = compare(&device, &ready).unwrap();
        assert_eq!(d.current, json!("ubuntu-bionic"));
        assert_eq!(d.expected, json!(null));
    }
}
