//! Validators
//!
//! Each validator compares one field of the NetBox inventory against what
//! MaaS or the hardware itself reports, and returns a [`Report`] of
//! discrepancies keyed by NetBox object id.

pub mod firmware;
pub mod interfaces;
pub mod ipmi;
pub mod platform;
pub mod primary_ipv4;
pub mod serial;
pub mod status;
pub mod switch_connections;

use crate::clients::ClientError;
use crate::config::FilterConfig;
use crate::context::Context;
use clap::ValueEnum;
use maasbox_core::{Device, Machine, Report};
use std::collections::HashMap;
use strum::{Display, EnumString};
use tracing::{debug, info};

/// A reconciled field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum Field {
    /// Device serial number vs the lshw system serial
    Serial,
    /// IPMI web location vs the management interface MAC
    Ipmi,
    /// Management interface MAC vs the BMC's own MAC
    IpmiInterface,
    /// Device status vs the MaaS node status
    Status,
    /// Primary IPv4 vs the address on the primary MaaS interface
    PrimaryIpv4,
    /// Interfaces discovered by lshw but missing from NetBox
    Interfaces,
    /// BMC and BIOS versions vs the BMC's report
    Firmware,
    /// Platform vs the deployed OS
    Platform,
    /// Cabling and VLANs vs LLDP neighbours
    SwitchConnections,
}

impl Field {
    /// Whether the validator only needs NetBox and the BMCs.
    fn is_netbox_only(self) -> bool {
        matches!(self, Field::Ipmi | Field::IpmiInterface | Field::Firmware)
    }
}

/// Drop devices whose name ends with an excluded suffix.
pub fn sanitize_devices(devices: Vec<Device>, filters: &FilterConfig) -> Vec<Device> {
    devices
        .into_iter()
        .filter(|device| {
            let keep = filters.accepts_device_name(&device.name);
            if !keep {
                debug!(device = %device.name, "Skipping excluded device");
            }
            keep
        })
        .collect()
}

/// Deployed or ready machines passing the hostname filter, keyed by
/// lower-cased hostname.
pub fn sanitize_machines(machines: Vec<Machine>, filters: &FilterConfig) -> HashMap<String, Machine> {
    machines
        .into_iter()
        .filter(|m| filters.accepts_hostname(&m.hostname) && m.status.is_settled())
        .map(|m| (m.key(), m))
        .collect()
}

/// NetBox devices and their MaaS counterparts.
#[derive(Debug, Default)]
pub struct Inventory {
    pub devices: Vec<Device>,
    pub machines: HashMap<String, Machine>,
}

impl Inventory {
    pub fn new(devices: Vec<Device>, machines: Vec<Machine>, filters: &FilterConfig) -> Self {
        Self {
            devices: sanitize_devices(devices, filters),
            machines: sanitize_machines(machines, filters),
        }
    }

    /// Fetch both inventories.
    pub async fn fetch(ctx: &Context) -> Result<Self, ClientError> {
        let (devices, machines) = tokio::try_join!(
            ctx.netbox
                .devices_by_site(ctx.site(), &ctx.config.netbox.device_type_ids),
            ctx.maas.machines(),
        )?;
        info!(
            devices = devices.len(),
            machines = machines.len(),
            "Fetched inventories"
        );
        Ok(Self::new(devices, machines, &ctx.config.filters))
    }

    pub fn machine_for(&self, device: &Device) -> Option<&Machine> {
        self.machines.get(&device.name.to_lowercase())
    }

    /// Devices with a MaaS counterpart. Others are skipped silently.
    pub fn pairs(&self) -> impl Iterator<Item = (&Device, &Machine)> {
        self.devices
            .iter()
            .filter_map(|device| self.machine_for(device).map(|machine| (device, machine)))
    }
}

/// Sanitized NetBox devices of the configured site.
pub async fn fetch_devices(ctx: &Context) -> Result<Vec<Device>, ClientError> {
    let devices = ctx
        .netbox
        .devices_by_site(ctx.site(), &ctx.config.netbox.device_type_ids)
        .await?;
    info!(devices = devices.len(), "Fetched NetBox devices");
    Ok(sanitize_devices(devices, &ctx.config.filters))
}

/// Run the validator for `field`.
pub async fn validate(ctx: &Context, field: Field) -> anyhow::Result<Report> {
    info!(%field, "Validating");
    ctx.config.netbox.site()?;

    let report = if field.is_netbox_only() {
        let devices = fetch_devices(ctx).await?;
        match field {
            Field::Ipmi => ipmi::check_locations(ctx, &devices).await?,
            Field::IpmiInterface => ipmi::check_interfaces(ctx, &devices).await?,
            _ => firmware::check(ctx, &devices).await?,
        }
    } else {
        let inventory = Inventory::fetch(ctx).await?;
        match field {
            Field::Serial => serial::check(ctx, &inventory).await?,
            Field::Status => status::check(&inventory),
            Field::PrimaryIpv4 => {
                primary_ipv4::check(&inventory, &ctx.config.maas.primary_interface)
            }
            Field::Interfaces => interfaces::check(ctx, &inventory).await?,
            Field::Platform => platform::check(&inventory),
            _ => switch_connections::check(ctx, &inventory).await?,
        }
    };

    info!(%field, discrepancies = report.len(), "Validation finished");
    Ok(report)
}
