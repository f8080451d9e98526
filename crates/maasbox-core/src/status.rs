//! MaaS to NetBox status mapping

use crate::maas::NodeStatus;

/// NetBox device status label expected for a machine in the given MaaS
/// state. Transitional states have no NetBox equivalent and map to `None`;
/// they are never reported as a mismatch.
pub fn netbox_status(status: NodeStatus) -> Option<&'static str> {
    use NodeStatus::*;

    match status {
        Deployed => Some("Active"),
        Allocated | Reserved => Some("Planned"),
        New => Some("Inventory"),
        Ready | Retired => Some("Offline"),
        Broken
        | Missing
        | RescueMode
        | FailedCommissioning
        | FailedDeployment
        | FailedTesting
        | FailedExitingRescueMode
        | FailedEnteringRescueMode
        | FailedDiskErasing
        | FailedReleasing => Some("Failed"),
        Commissioning | Deploying | EnteringRescueMode | ExitingRescueMode | Testing
        | Releasing | DiskErasing => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settled_states() {
        assert_eq!(netbox_status(NodeStatus::Deployed), Some("Active"));
        assert_eq!(netbox_status(NodeStatus::Ready), Some("Offline"));
        assert_eq!(netbox_status(NodeStatus::Retired), Some("Offline"));
        assert_eq!(netbox_status(NodeStatus::Allocated), Some("Planned"));
        assert_eq!(netbox_status(NodeStatus::New), Some("Inventory"));
    }

    #[test]
    fn test_failures_and_transitions() {
        assert_eq!(netbox_status(NodeStatus::Missing), Some("Failed"));
        assert_eq!(netbox_status(NodeStatus::RescueMode), Some("Failed"));
        assert_eq!(netbox_status(NodeStatus::FailedDiskErasing), Some("Failed"));
        assert_eq!(netbox_status(NodeStatus::Deploying), None);
        assert_eq!(netbox_status(NodeStatus::DiskErasing), None);
    }
}
