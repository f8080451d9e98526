//! Management interface creator

use crate::context::Context;
use anyhow::{anyhow, Context as _};
use macaddr::MacAddr6;
use maasbox_core::mac;
use maasbox_core::netbox::{codes, NewInterface};
use serde::Deserialize;
use tracing::debug;

/// `--data` document: `{"node": 12, "mac_address": "...", "type": "1000BASE-T (1GE)"}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IpmiInterfaceData {
    /// NetBox device id
    pub node: i64,
    #[serde(with = "mac::string")]
    pub mac_address: MacAddr6,
    /// Interface type label as NetBox displays it
    #[serde(rename = "type")]
    pub kind: String,
}

impl IpmiInterfaceData {
    pub fn parse(data: &str) -> anyhow::Result<Self> {
        serde_json::from_str(data).context("invalid ipmi-interface data")
    }
}

/// The interface NetBox should hold for the BMC, given the resolved type
/// value.
pub fn interface(data: &IpmiInterfaceData, kind: serde_json::Value) -> NewInterface {
    NewInterface {
        kind: Some(kind),
        enabled: Some(true),
        mtu: Some(codes::MGMT_MTU),
        mac_address: Some(data.mac_address),
        mgmt_only: Some(true),
        mode: Some(codes::MODE_ACCESS),
        ..NewInterface::named(data.node, mac::compact(&data.mac_address))
    }
}

/// Create the management interface, returning its id.
pub async fn create(ctx: &Context, data: &IpmiInterfaceData) -> anyhow::Result<i64> {
    let kind = ctx
        .netbox
        .interface_types()
        .await
        .context("failed to fetch NetBox interface types")?
        .into_iter()
        .find(|choice| choice.label == data.kind)
        .map(|choice| choice.value)
        .ok_or_else(|| anyhow!("unknown interface type {:?}", data.kind))?;
    debug!(label = %data.kind, value = %kind, "Resolved interface type");

    let id = ctx.netbox.create_interface(&interface(data, kind)).await?;
    Ok(id)
}
