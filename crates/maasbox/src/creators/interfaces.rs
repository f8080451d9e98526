//! Interface bootstrap
//!
//! For every deployed or ready machine with a NetBox device of the same
//! name, brings the device's interfaces in line with the MaaS network
//! configuration:
//!
//! 1. create interfaces NetBox does not have yet (bonds, VLANs, bridges)
//! 2. set MTU and 802.1Q mode on the physical interfaces
//! 3. link bond members to their bond and VLAN/bridge interfaces to their parent
//! 4. create the IPv4 addresses NetBox does not know, making the one on an
//!    untagged interface the primary address
//! 5. set the untagged VLAN LLDP reports and cable each interface to its
//!    switch port
//!
//! Existing records are never removed. A failing step aborts that node only.

use crate::clients::ClientError;
use crate::context::Context;
use crate::validators::Inventory;
use maasbox_core::netbox::{codes, DevicePatch, InterfacePatch, NewCable, NewInterface, NewIpAddress};
use maasbox_core::{Device, InterfaceKind, Machine, MachineInterface};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("interface {0} is not known to NetBox")]
    UnknownInterface(String),
    #[error("switch {0} not found at NetBox")]
    UnknownSwitch(String),
    #[error("switch {switch} has no port {port}")]
    UnknownPort { switch: String, port: String },
}

/// Outcome of a bootstrap run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub nodes: usize,
    pub failed: usize,
}

/// VLAN ids of the site, looked up once per VID.
struct VlanCache<'a> {
    ctx: &'a Context,
    ids: HashMap<u16, Option<i64>>,
}

impl<'a> VlanCache<'a> {
    fn new(ctx: &'a Context) -> Self {
        Self {
            ctx,
            ids: HashMap::new(),
        }
    }

    async fn id(&mut self, vid: u16) -> Result<Option<i64>, ClientError> {
        if let Some(id) = self.ids.get(&vid) {
            return Ok(*id);
        }
        let site = self.ctx.site();
        let id = self.ctx.netbox.vlan_of_site(site, vid).await?.map(|v| v.id);
        if id.is_none() {
            warn!(vid, site, "VLAN not found at NetBox");
        }
        self.ids.insert(vid, id);
        Ok(id)
    }

    /// 802.1Q mode and tagged VLANs for a MaaS interface.
    async fn mode(&mut self, iface: &MachineInterface) -> Result<(u16, Vec<i64>), ClientError> {
        if !iface.is_tagged() {
            return Ok((codes::MODE_ACCESS, Vec::new()));
        }
        let tagged = self.id(iface.vid()).await?.into_iter().collect();
        Ok((codes::MODE_TAGGED, tagged))
    }
}

/// NetBox interface type for a virtual MaaS interface. Physical interfaces
/// keep whatever type NetBox assigns.
fn interface_type(kind: InterfaceKind) -> Option<u16> {
    match kind {
        InterfaceKind::Bond => Some(codes::TYPE_LAG),
        InterfaceKind::Vlan | InterfaceKind::Bridge => Some(codes::TYPE_OTHER),
        InterfaceKind::Physical | InterfaceKind::Unknown => None,
    }
}

/// Interfaces of a machine that take part in the bootstrap.
fn known_interfaces(machine: &Machine) -> impl Iterator<Item = &MachineInterface> {
    machine
        .interface_set
        .iter()
        .filter(|iface| iface.kind != InterfaceKind::Unknown)
}

/// NetBox interface ids of a device, keyed by name.
struct DeviceInterfaces {
    ids: HashMap<String, i64>,
}

impl DeviceInterfaces {
    fn id(&self, name: &str) -> Result<i64, BootstrapError> {
        self.ids
            .get(name)
            .copied()
            .ok_or_else(|| BootstrapError::UnknownInterface(name.to_string()))
    }
}

async fn create_interfaces(
    ctx: &Context,
    vlans: &mut VlanCache<'_>,
    device: &Device,
    machine: &Machine,
    ifaces: &mut DeviceInterfaces,
) -> Result<(), BootstrapError> {
    for iface in known_interfaces(machine) {
        if ifaces.ids.contains_key(&iface.name) {
            continue;
        }
        let (mode, tagged_vlans) = vlans.mode(iface).await?;
        let interface = NewInterface {
            kind: interface_type(iface.kind).map(Value::from),
            enabled: Some(iface.enabled),
            mtu: iface.effective_mtu,
            mac_address: iface.mac_address.parse().ok(),
            mode: Some(mode),
            tagged_vlans,
            ..NewInterface::named(device.id, &iface.name)
        };
        let id = ctx.netbox.create_interface(&interface).await?;
        ifaces.ids.insert(iface.name.clone(), id);
    }
    Ok(())
}

async fn update_physical_interfaces(
    ctx: &Context,
    vlans: &mut VlanCache<'_>,
    machine: &Machine,
    ifaces: &DeviceInterfaces,
) -> Result<(), BootstrapError> {
    let physical = machine
        .interface_set
        .iter()
        .filter(|iface| iface.kind == InterfaceKind::Physical);

    for iface in physical {
        let (mode, tagged_vlans) = vlans.mode(iface).await?;
        let patch = InterfacePatch {
            mtu: iface.effective_mtu,
            mode: Some(mode),
            tagged_vlans: iface.is_tagged().then_some(tagged_vlans),
            ..Default::default()
        };
        ctx.netbox.patch_interface(ifaces.id(&iface.name)?, &patch).await?;
    }
    Ok(())
}

async fn link_parents(
    ctx: &Context,
    machine: &Machine,
    ifaces: &DeviceInterfaces,
) -> Result<(), BootstrapError> {
    for iface in known_interfaces(machine) {
        let id = ifaces.id(&iface.name)?;
        for parent in &iface.parents {
            let parent_id = ifaces.id(parent)?;
            // Bond members point at the bond; VLANs and bridges at their base
            let (member, lag) = match iface.kind {
                InterfaceKind::Bond => (parent_id, id),
                InterfaceKind::Vlan | InterfaceKind::Bridge => (id, parent_id),
                _ => continue,
            };
            let patch = InterfacePatch {
                lag: Some(lag),
                ..Default::default()
            };
            ctx.netbox.patch_interface(member, &patch).await?;
        }
    }
    Ok(())
}

async fn create_ip_addresses(
    ctx: &Context,
    device: &Device,
    machine: &Machine,
    ifaces: &DeviceInterfaces,
) -> Result<(), BootstrapError> {
    for iface in known_interfaces(machine) {
        let Some(address) = iface.ipv4_with_prefix() else {
            continue;
        };
        if !ctx.netbox.ip_addresses(&address).await?.is_empty() {
            debug!(device = %device.name, address, "IP address already known");
            continue;
        }

        let ip = NewIpAddress {
            address,
            status: codes::IP_STATUS_ACTIVE,
            interface: ifaces.id(&iface.name)?,
        };
        let id = ctx.netbox.create_ip_address(&ip).await?;

        if !iface.is_tagged() {
            let patch = DevicePatch {
                primary_ip4: Some(id),
                ..Default::default()
            };
            ctx.netbox.patch_device(device.id, &patch).await?;
        }
    }
    Ok(())
}

async fn connect_switches(
    ctx: &Context,
    vlans: &mut VlanCache<'_>,
    machine: &Machine,
    ifaces: &DeviceInterfaces,
) -> Result<(), BootstrapError> {
    let details = ctx.maas.machine_details(&machine.system_id).await?;

    for connection in details.switch_connections() {
        let id = ifaces.id(&connection.name)?;
        let iface = ctx.netbox.interface(id).await?;

        if let Some(vlan) = vlans.id(connection.vid).await? {
            let patch = InterfacePatch {
                untagged_vlan: Some(vlan),
                ..Default::default()
            };
            ctx.netbox.patch_interface(id, &patch).await?;
            if let Some(lag) = &iface.lag {
                ctx.netbox.patch_interface(lag.id, &patch).await?;
            }
        }

        let switch = ctx
            .netbox
            .device_by_name(&connection.switch_name)
            .await?
            .ok_or_else(|| BootstrapError::UnknownSwitch(connection.switch_name.clone()))?;
        let port = ctx
            .netbox
            .interfaces(switch.id, Some(&connection.switch_port))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BootstrapError::UnknownPort {
                switch: connection.switch_name.clone(),
                port: connection.switch_port.clone(),
            })?;

        if ctx.netbox.cable_between(id, port.id).await?.is_some() {
            debug!(interface = %connection.name, switch = %switch.name, "Cable already present");
            continue;
        }
        let cable = NewCable::between(id, port.id, connection.cable_color.clone());
        ctx.netbox.create_cable(&cable).await?;
    }
    Ok(())
}

async fn bootstrap(
    ctx: &Context,
    vlans: &mut VlanCache<'_>,
    device: &Device,
    machine: &Machine,
) -> Result<(), BootstrapError> {
    let mut ifaces = DeviceInterfaces {
        ids: ctx
            .netbox
            .interfaces(device.id, None)
            .await?
            .into_iter()
            .map(|iface| (iface.name, iface.id))
            .collect(),
    };

    create_interfaces(ctx, vlans, device, machine, &mut ifaces).await?;
    update_physical_interfaces(ctx, vlans, machine, &ifaces).await?;
    link_parents(ctx, machine, &ifaces).await?;
    create_ip_addresses(ctx, device, machine, &ifaces).await?;
    connect_switches(ctx, vlans, machine, &ifaces).await
}

/// Bootstrap every matched node.
pub async fn run(ctx: &Context) -> Result<Summary, ClientError> {
    let inventory = Inventory::fetch(ctx).await?;
    let mut vlans = VlanCache::new(ctx);
    let mut summary = Summary::default();

    for (device, machine) in inventory.pairs() {
        info!(device = %device.name, "Updating node");
        summary.nodes += 1;
        if let Err(e) = bootstrap(ctx, &mut vlans, device, machine).await {
            error!(device = %device.name, error = %e, "Interface bootstrap failed");
            summary.failed += 1;
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use httpmock::Method::{GET, PATCH, POST};
    use serde_json::json;

    const LLDP: &str = r#"<lldp label="LLDP neighbors">
 <interface label="Interface" name="eno1" via="LLDP">
  <chassis label="Chassis"><name label="SysName">sw01</name></chassis>
  <port label="Port"><id label="PortID" type="ifname">Ethernet1</id>
   <descr label="PortDescr">lar0101 eno1 (rack 1 port: red)</descr></port>
  <vlan label="VLAN" vlan-id="100" pvid="yes">v100</vlan>
 </interface>
</lldp>"#;

    fn machine() -> Value {
        json!({
            "system_id": "lar0101-id",
            "hostname": "lar0101",
            "status": 6,
            "interface_set": [
                {"id": 1, "name": "eno1", "type": "physical", "enabled": true,
                 "mac_address": "0c:c4:7a:01:02:03", "effective_mtu": 9000, "vlan": {"vid": 0}},
                {"id": 2, "name": "eno2", "type": "physical", "enabled": true,
                 "mac_address": "0c:c4:7a:01:02:04", "effective_mtu": 9000, "vlan": {"vid": 0}},
                {"id": 3, "name": "bond0", "type": "bond", "enabled": true,
                 "mac_address": "0c:c4:7a:01:02:03", "effective_mtu": 9000, "vlan": {"vid": 0},
                 "parents": ["eno1", "eno2"],
                 "links": [{"ip_address": "10.0.0.5", "subnet": {"cidr": "10.0.0.0/24"}}]},
                {"id": 4, "name": "bond0.200", "type": "vlan", "enabled": true,
                 "vlan": {"vid": 200}, "parents": ["bond0"],
                 "links": [{"ip_address": "192.168.1.5", "subnet": {"cidr": "192.168.1.0/24"}}]},
                {"id": 5, "name": "tap0", "type": "alias"}
            ]
        })
    }

    fn patch_interface(fixture: &Fixture, id: i64, body: Value) -> httpmock::Mock<'_> {
        fixture.netbox.mock(|when, then| {
            when.method(PATCH)
                .path(format!("/api/dcim/interfaces/{id}/"))
                .json_body(body);
            then.status(200).json_body(json!({"id": id}));
        })
    }

    #[test]
    fn test_interface_type() {
        assert_eq!(interface_type(InterfaceKind::Bond), Some(200));
        assert_eq!(interface_type(InterfaceKind::Vlan), Some(32767));
        assert_eq!(interface_type(InterfaceKind::Bridge), Some(32767));
        assert_eq!(interface_type(InterfaceKind::Physical), None);
    }

    #[tokio::test]
    async fn test_bootstrap_node() {
        let fixture = Fixture::new();
        fixture.devices(json!([{"id": 1, "name": "LAR0101"}]));
        fixture.machines(json!([machine()]));
        fixture.details("lar0101-id", None, Some(LLDP));
        fixture.interfaces(
            1,
            json!([
                {"id": 11, "name": "eno1", "mac_address": "0C:C4:7A:01:02:03"},
                {"id": 12, "name": "eno2", "mac_address": "0C:C4:7A:01:02:04"}
            ]),
        );
        for (vid, id) in [(100, 40), (200, 42)] {
            fixture.netbox.mock(|when, then| {
                when.method(GET)
                    .path("/api/ipam/vlans/")
                    .query_param("vid", vid.to_string());
                then.status(200)
                    .json_body(json!({"results": [{"id": id, "vid": vid}]}));
            });
        }

        // 1. virtual interfaces
        let bond = fixture.netbox.mock(|when, then| {
            when.method(POST).path("/api/dcim/interfaces/").json_body(json!({
                "device": 1, "name": "bond0", "type": 200, "enabled": true, "mtu": 9000,
                "mac_address": "0C:C4:7A:01:02:03", "mode": 100
            }));
            then.status(201).json_body(json!({"id": 13}));
        });
        let vlan = fixture.netbox.mock(|when, then| {
            when.method(POST).path("/api/dcim/interfaces/").json_body(json!({
                "device": 1, "name": "bond0.200", "type": 32767, "enabled": true,
                "mode": 200, "tagged_vlans": [42]
            }));
            then.status(201).json_body(json!({"id": 14}));
        });

        // 2. physical interfaces
        let mtu = [
            patch_interface(&fixture, 11, json!({"mtu": 9000, "mode": 100})),
            patch_interface(&fixture, 12, json!({"mtu": 9000, "mode": 100})),
        ];

        // 3. parents
        let lags = [
            patch_interface(&fixture, 11, json!({"lag": 13})),
            patch_interface(&fixture, 12, json!({"lag": 13})),
            patch_interface(&fixture, 14, json!({"lag": 13})),
        ];

        // 4. addresses
        fixture.netbox.mock(|when, then| {
            when.method(GET)
                .path("/api/ipam/ip-addresses/")
                .query_param("address", "10.0.0.5/24");
            then.status(200).json_body(json!({"results": []}));
        });
        fixture.netbox.mock(|when, then| {
            when.method(GET)
                .path("/api/ipam/ip-addresses/")
                .query_param("address", "192.168.1.5/24");
            then.status(200)
                .json_body(json!({"results": [{"id": 32, "address": "192.168.1.5/24"}]}));
        });
        let address = fixture.netbox.mock(|when, then| {
            when.method(POST)
                .path("/api/ipam/ip-addresses/")
                .json_body(json!({"address": "10.0.0.5/24", "status": 1, "interface": 13}));
            then.status(201).json_body(json!({"id": 31}));
        });
        let primary = fixture.netbox.mock(|when, then| {
            when.method(PATCH)
                .path("/api/dcim/devices/1/")
                .json_body(json!({"primary_ip4": 31}));
            then.status(200).json_body(json!({"id": 1}));
        });

        // 5. switch connections
        fixture.netbox.mock(|when, then| {
            when.method(GET).path("/api/dcim/interfaces/11/");
            then.status(200)
                .json_body(json!({"id": 11, "name": "eno1", "lag": {"id": 13, "name": "bond0"}}));
        });
        let untagged = [
            patch_interface(&fixture, 11, json!({"untagged_vlan": 40})),
            patch_interface(&fixture, 13, json!({"untagged_vlan": 40})),
        ];
        fixture.netbox.mock(|when, then| {
            when.method(GET).path("/api/dcim/devices/").query_param("name", "sw01");
            then.status(200).json_body(json!({"results": [{"id": 50, "name": "sw01"}]}));
        });
        fixture.interface_named(50, "Ethernet1", json!([{"id": 501, "name": "Ethernet1"}]));
        fixture.netbox.mock(|when, then| {
            when.method(GET).path("/api/dcim/cables/");
            then.status(200).json_body(json!({"results": []}));
        });
        let cable = fixture.netbox.mock(|when, then| {
            when.method(POST).path("/api/dcim/cables/").json_body(json!({
                "termination_a_type": "dcim.interface",
                "termination_a_id": 11,
                "termination_b_type": "dcim.interface",
                "termination_b_id": 501,
                "status": true,
                "color": "f44336"
            }));
            then.status(201).json_body(json!({"id": 9}));
        });

        let summary = run(&fixture.ctx).await.unwrap();

        assert_eq!(summary, Summary { nodes: 1, failed: 0 });
        bond.assert();
        vlan.assert();
        for mock in mtu.iter().chain(&lags).chain(&untagged) {
            mock.assert();
        }
        address.assert();
        primary.assert();
        cable.assert();
    }

    #[tokio::test]
    async fn test_failed_node_is_counted() {
        let fixture = Fixture::new();
        fixture.devices(json!([{"id": 1, "name": "LAR0101"}]));
        fixture.machines(json!([{
            "system_id": "lar0101-id",
            "hostname": "lar0101",
            "status": 4,
            "interface_set": [
                {"id": 1, "name": "eno1", "type": "physical", "vlan": {"vid": 0}}
            ]
        }]));
        fixture.interfaces(1, json!([]));
        let rejected = fixture.netbox.mock(|when, then| {
            when.method(POST).path("/api/dcim/interfaces/");
            then.status(400).json_body(json!({"type": ["This field is required."]}));
        });

        let summary = run(&fixture.ctx).await.unwrap();
        rejected.assert();
        assert_eq!(summary, Summary { nodes: 1, failed: 1 });
    }
}
