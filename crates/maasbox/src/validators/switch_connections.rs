//! Switch connection validator
//!
//! Walks each LLDP neighbour of a machine through NetBox: the node
//! interface, its untagged VLAN (and that of its LAG), the switch, the
//! switch port, the cable between them and the cable colour. The first
//! failing step is recorded for the interface and the rest are skipped.
//!
//! Discrepancies are keyed by device id. `current` maps each failing
//! interface to the problem found, `expected` to the connection LLDP
//! describes.

use super::Inventory;
use crate::clients::ClientError;
use crate::context::Context;
use maasbox_core::lldp::SwitchConnection;
use maasbox_core::{Device, Discrepancy, Report};
use serde_json::{json, Map, Value};
use strum::Display;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Problem {
    #[strum(to_string = "interface missing")]
    InterfaceMissing,
    #[strum(to_string = "interface ambiguous")]
    InterfaceAmbiguous,
    #[strum(to_string = "untagged VLAN mismatch")]
    UntaggedVlanMismatch,
    #[strum(to_string = "LAG untagged VLAN mismatch")]
    LagVlanMismatch,
    #[strum(to_string = "switch missing")]
    SwitchMissing,
    #[strum(to_string = "switch port missing")]
    SwitchPortMissing,
    #[strum(to_string = "cable missing")]
    CableMissing,
    #[strum(to_string = "cable color mismatch")]
    CableColorMismatch,
}

/// Check one LLDP neighbour of a device.
pub async fn check_connection(
    ctx: &Context,
    device: &Device,
    connection: &SwitchConnection,
) -> Result<Option<Problem>, ClientError> {
    let netbox = &ctx.netbox;

    let mut found = netbox.interfaces(device.id, Some(&connection.name)).await?;
    let iface = match found.len() {
        0 => return Ok(Some(Problem::InterfaceMissing)),
        1 => found.remove(0),
        _ => return Ok(Some(Problem::InterfaceAmbiguous)),
    };

    if let Some(untagged) = &iface.untagged_vlan {
        let expected = netbox
            .vlan_of_site(ctx.site(), connection.vid)
            .await?
            .map(|vlan| vlan.id);
        if expected != Some(untagged.id) {
            return Ok(Some(Problem::UntaggedVlanMismatch));
        }

        if let Some(lag) = &iface.lag {
            let lag = netbox.interface(lag.id).await?;
            if lag.untagged_vlan.map(|vlan| vlan.id) != expected {
                return Ok(Some(Problem::LagVlanMismatch));
            }
        }
    }

    let Some(switch) = netbox.device_by_name(&connection.switch_name).await? else {
        return Ok(Some(Problem::SwitchMissing));
    };

    let mut ports = netbox
        .interfaces(switch.id, Some(&connection.switch_port))
        .await?;
    if ports.len() != 1 {
        return Ok(Some(Problem::SwitchPortMissing));
    }
    let port = ports.remove(0);

    let Some(cable) = netbox.cable_between(iface.id, port.id).await? else {
        return Ok(Some(Problem::CableMissing));
    };

    // Colour is only judged when the port description names one
    if let Some(color) = connection.cable_color.as_deref() {
        if cable.color() != Some(color) {
            return Ok(Some(Problem::CableColorMismatch));
        }
    }

    Ok(None)
}

fn expectation(connection: &SwitchConnection) -> Value {
    json!({
        "switch": connection.switch_name,
        "port": connection.switch_port,
        "vid": connection.vid,
        "color": connection.cable_color,
    })
}

pub async fn check(ctx: &Context, inventory: &Inventory) -> Result<Report, ClientError> {
    debug!("Checking switch connections declared at NetBox");
    let mut report = Report::new();

    for (device, machine) in inventory.pairs() {
        debug!(device = %device.name, "Checking switch connections");
        let details = match ctx.maas.machine_details(&machine.system_id).await {
            Ok(details) => details,
            Err(e) => {
                error!(device = %device.name, error = %e, "Failed to fetch machine details");
                continue;
            }
        };

        let mut current = Map::new();
        let mut expected = Map::new();
        for connection in details.switch_connections() {
            match check_connection(ctx, device, &connection).await {
                Ok(None) => {}
                Ok(Some(problem)) => {
                    error!(
                        device = %device.name,
                        interface = %connection.name,
                        switch = %connection.switch_name,
                        port = %connection.switch_port,
                        "{problem}"
                    );
                    current.insert(connection.name.clone(), json!(problem.to_string()));
                    expected.insert(connection.name.clone(), expectation(&connection));
                }
                Err(e) => {
                    error!(device = %device.name, interface = %connection.name, error = %e, "Switch connection check failed");
                }
            }
        }

        if !expected.is_empty() {
            report.insert(device.id, Discrepancy::new(current, expected));
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{machine, Fixture};
    use crate::validators::{validate, Field};
    use httpmock::Method::GET;

    const LLDP: &str = r#"<lldp label="LLDP neighbors">
 <interface label="Interface" name="eno1" via="LLDP">
  <chassis label="Chassis"><name label="SysName">sw01</name></chassis>
  <port label="Port"><id label="PortID" type="ifname">Ethernet1</id>
   <descr label="PortDescr">lar0101 eno1 (rack 1 port: red)</descr></port>
  <vlan label="VLAN" vlan-id="100" pvid="yes">v100</vlan>
 </interface>
 <interface label="Interface" name="eno2" via="LLDP">
  <chassis label="Chassis"><name label="SysName">sw01</name></chassis>
  <port label="Port"><id label="PortID" type="ifname">Ethernet2</id>
   <descr label="PortDescr">lar0101 eno2</descr></port>
  <vlan label="VLAN" vlan-id="100" pvid="yes">v100</vlan>
 </interface>
</lldp>"#;

    fn fixture() -> Fixture {
        let fixture = Fixture::new();
        fixture.devices(json!([{"id": 1, "name": "LAR0101"}]));
        fixture.machines(json!([machine("lar0101", 6)]));
        fixture.details("lar0101-id", None, Some(LLDP));
        fixture.interface_named(
            1,
            "eno1",
            json!([{"id": 11, "name": "eno1", "untagged_vlan": {"id": 40, "vid": 100}, "lag": {"id": 13, "name": "bond0"}}]),
        );
        fixture.interface_named(1, "eno2", json!([{"id": 12, "name": "eno2"}]));
        fixture.netbox.mock(|when, then| {
            when.method(GET).path("/api/ipam/vlans/").query_param("vid", "100");
            then.status(200).json_body(json!({"results": [{"id": 40, "vid": 100}]}));
        });
        fixture.netbox.mock(|when, then| {
            when.method(GET).path("/api/dcim/interfaces/13/");
            then.status(200)
                .json_body(json!({"id": 13, "name": "bond0", "untagged_vlan": {"id": 40, "vid": 100}}));
        });
        fixture.netbox.mock(|when, then| {
            when.method(GET).path("/api/dcim/devices/").query_param("name", "sw01");
            then.status(200).json_body(json!({"results": [{"id": 50, "name": "sw01"}]}));
        });
        fixture.interface_named(50, "Ethernet1", json!([{"id": 501, "name": "Ethernet1"}]));
        fixture.interface_named(50, "Ethernet2", json!([{"id": 502, "name": "Ethernet2"}]));
        fixture
    }

    #[tokio::test]
    async fn test_reports_first_failing_step() {
        let fixture = fixture();
        // eno1 is cabled with the wrong colour, eno2 has no cable at all
        fixture.netbox.mock(|when, then| {
            when.method(GET).path("/api/dcim/cables/");
            then.status(200).json_body(json!({"results": [
                {"id": 9, "termination_a_id": 11, "termination_b_id": 501, "color": "2196f3"}
            ]}));
        });

        let report = validate(&fixture.ctx, Field::SwitchConnections).await.unwrap();

        let d = &report[&1];
        assert_eq!(
            d.current,
            json!({"eno1": "cable color mismatch", "eno2": "cable missing"})
        );
        assert_eq!(
            d.expected["eno1"],
            json!({"switch": "sw01", "port": "Ethernet1", "vid": 100, "color": "f44336"})
        );
        assert_eq!(d.expected["eno2"]["color"], json!(null));
    }

    #[tokio::test]
    async fn test_consistent_cabling_is_clean() {
        let fixture = fixture();
        fixture.netbox.mock(|when, then| {
            when.method(GET).path("/api/dcim/cables/");
            then.status(200).json_body(json!({"results": [
                {"id": 9, "termination_a_id": 501, "termination_b_id": 11, "color": "f44336"},
                {"id": 10, "termination_a_id": 12, "termination_b_id": 502, "color": ""}
            ]}));
        });

        let report = validate(&fixture.ctx, Field::SwitchConnections).await.unwrap();
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn test_each_failing_step() {
        let fixture = Fixture::new();
        let device: Device = serde_json::from_value(json!({"id": 1, "name": "LAR0101"})).unwrap();
        fixture.interface_named(1, "eno1", json!([]));
        fixture.interface_named(1, "eno2", json!([{"id": 12, "name": "eno2", "untagged_vlan": {"id": 41, "vid": 200}}]));
        fixture.interface_named(1, "eno3", json!([{"id": 13, "name": "eno3"}, {"id": 113, "name": "eno3"}]));
        fixture.interface_named(
            1,
            "eno4",
            json!([{"id": 14, "name": "eno4", "untagged_vlan": {"id": 40, "vid": 100}, "lag": {"id": 20, "name": "bond0"}}]),
        );
        fixture.interface_named(1, "eno5", json!([{"id": 15, "name": "eno5"}]));
        fixture.interface_named(1, "eno6", json!([{"id": 16, "name": "eno6"}]));
        fixture.netbox.mock(|when, then| {
            when.method(GET).path("/api/ipam/vlans/");
            then.status(200).json_body(json!({"results": [{"id": 40, "vid": 100}]}));
        });
        fixture.netbox.mock(|when, then| {
            when.method(GET).path("/api/dcim/interfaces/20/");
            then.status(200)
                .json_body(json!({"id": 20, "name": "bond0", "untagged_vlan": {"id": 41, "vid": 200}}));
        });
        fixture.netbox.mock(|when, then| {
            when.method(GET).path("/api/dcim/devices/").query_param("name", "sw01");
            then.status(200).json_body(json!({"results": [{"id": 50, "name": "sw01"}]}));
        });
        fixture.netbox.mock(|when, then| {
            when.method(GET).path("/api/dcim/devices/").query_param("name", "sw99");
            then.status(200).json_body(json!({"results": []}));
        });
        fixture.interface_named(50, "Ethernet9", json!([]));

        let connection = |name: &str, switch: &str, port: &str| SwitchConnection {
            name: name.to_string(),
            switch_name: switch.to_string(),
            switch_port: port.to_string(),
            vid: 100,
            cable_color: None,
        };
        let cases = [
            (connection("eno1", "sw01", "Ethernet1"), Problem::InterfaceMissing),
            (connection("eno2", "sw01", "Ethernet1"), Problem::UntaggedVlanMismatch),
            (connection("eno3", "sw01", "Ethernet1"), Problem::InterfaceAmbiguous),
            (connection("eno4", "sw01", "Ethernet1"), Problem::LagVlanMismatch),
            (connection("eno5", "sw99", "Ethernet1"), Problem::SwitchMissing),
            (connection("eno6", "sw01", "Ethernet9"), Problem::SwitchPortMissing),
        ];

        for (connection, problem) in cases {
            assert_eq!(
                check_connection(&fixture.ctx, &device, &connection).await.unwrap(),
                Some(problem),
                "{}",
                connection.name
            );
        }
    }
}
