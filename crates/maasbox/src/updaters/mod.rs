//! Updaters
//!
//! Turn a validation [`Report`] into NetBox writes. Updating happens in two
//! steps: [`plan`] resolves every discrepancy into a concrete [`Change`]
//! (looking up choice values, platform and IP address ids along the way),
//! then [`apply`] performs the writes one by one. A failed write is logged
//! and counted, the remaining changes are still attempted.

use crate::context::Context;
use crate::validators::{self, Field};
use anyhow::{bail, Context as _};
use macaddr::MacAddr6;
use maasbox_core::lshw::DiscoveredInterface;
use maasbox_core::netbox::{DevicePatch, InterfacePatch, NewInterface, IPMI_FIELD};
use maasbox_core::{mac, Discrepancy, Report};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, error, info, warn};

/// A single NetBox write.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    PatchDevice { id: i64, patch: DevicePatch },
    PatchInterface { id: i64, patch: InterfacePatch },
    CreateInterface(NewInterface),
}

impl Change {
    /// Request body of the write.
    pub fn body(&self) -> Value {
        let body = match self {
            Change::PatchDevice { patch, .. } => serde_json::to_value(patch),
            Change::PatchInterface { patch, .. } => serde_json::to_value(patch),
            Change::CreateInterface(interface) => serde_json::to_value(interface),
        };
        body.unwrap_or(Value::Null)
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::PatchDevice { id, .. } => write!(f, "PATCH dcim/devices/{id}/"),
            Change::PatchInterface { id, .. } => write!(f, "PATCH dcim/interfaces/{id}/"),
            Change::CreateInterface(interface) => write!(
                f,
                "POST dcim/interfaces/ ({} on device {})",
                interface.name, interface.device
            ),
        }
    }
}

/// Writes resolved from a report.
#[derive(Debug, Default)]
pub struct Plan {
    pub changes: Vec<Change>,
    /// Discrepancies that could not be turned into a write.
    pub skipped: usize,
}

impl Plan {
    fn push(&mut self, change: Change) {
        debug!(%change, "Planned");
        self.changes.push(change);
    }

    fn skip(&mut self, id: i64, reason: &str) {
        warn!(id, "Skipping update: {reason}");
        self.skipped += 1;
    }
}

/// Outcome of an update run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub planned: usize,
    pub applied: usize,
    pub failed: usize,
    pub skipped: usize,
}

fn expected_str(id: i64, discrepancy: &Discrepancy, plan: &mut Plan) -> Option<String> {
    let expected = discrepancy.expected_str().map(str::to_string);
    if expected.is_none() {
        plan.skip(id, "expected value is not a string");
    }
    expected
}

/// The device's custom fields with `fields` merged in.
async fn merged_custom_fields(
    ctx: &Context,
    id: i64,
    fields: Map<String, Value>,
) -> anyhow::Result<Map<String, Value>> {
    let mut custom_fields = ctx
        .netbox
        .device(id)
        .await
        .with_context(|| format!("failed to re-read device {id}"))?
        .custom_fields;
    custom_fields.extend(fields);
    Ok(custom_fields)
}

/// Resolve every discrepancy in `report` into a NetBox write.
pub async fn plan(ctx: &Context, field: Field, report: &Report) -> anyhow::Result<Plan> {
    let mut plan = Plan::default();

    match field {
        Field::Serial => {
            for (&id, discrepancy) in report {
                if let Some(serial) = expected_str(id, discrepancy, &mut plan) {
                    let patch = DevicePatch {
                        serial: Some(serial),
                        ..Default::default()
                    };
                    plan.push(Change::PatchDevice { id, patch });
                }
            }
        }
        Field::Ipmi => {
            for (&id, discrepancy) in report {
                let Some(location) = expected_str(id, discrepancy, &mut plan) else {
                    continue;
                };
                let fields = Map::from_iter([(IPMI_FIELD.to_string(), Value::from(location))]);
                match merged_custom_fields(ctx, id, fields).await {
                    Ok(custom_fields) => plan.push(Change::PatchDevice {
                        id,
                        patch: DevicePatch {
                            custom_fields: Some(custom_fields),
                            ..Default::default()
                        },
                    }),
                    Err(e) => {
                        error!(id, error = %format!("{e:#}"), "Failed to prepare IPMI update");
                        plan.skipped += 1;
                    }
                }
            }
        }
        Field::IpmiInterface => {
            for (&id, discrepancy) in report {
                let Some(expected) = expected_str(id, discrepancy, &mut plan) else {
                    continue;
                };
                let Ok(mac_address) = expected.parse::<MacAddr6>() else {
                    plan.skip(id, "expected value is not a MAC address");
                    continue;
                };
                let patch = InterfacePatch {
                    name: Some(mac::compact(&mac_address)),
                    mac_address: Some(mac_address),
                    ..Default::default()
                };
                plan.push(Change::PatchInterface { id, patch });
            }
        }
        Field::Status => {
            let statuses = ctx
                .netbox
                .device_statuses()
                .await
                .context("failed to fetch NetBox device statuses")?;
            for (&id, discrepancy) in report {
                let Some(label) = expected_str(id, discrepancy, &mut plan) else {
                    continue;
                };
                match statuses.iter().find(|choice| choice.label == label) {
                    Some(choice) => plan.push(Change::PatchDevice {
                        id,
                        patch: DevicePatch {
                            status: Some(choice.value.clone()),
                            ..Default::default()
                        },
                    }),
                    None => plan.skip(id, &format!("unknown device status {label:?}")),
                }
            }
        }
        Field::PrimaryIpv4 => {
            for (&id, discrepancy) in report {
                let Some(address) = expected_str(id, discrepancy, &mut plan) else {
                    continue;
                };
                match ctx.netbox.ip_address(&address).await {
                    Ok(Some(ip)) => plan.push(Change::PatchDevice {
                        id,
                        patch: DevicePatch {
                            primary_ip4: Some(ip.id),
                            ..Default::default()
                        },
                    }),
                    Ok(None) => plan.skip(id, &format!("no unique IP address record for {address}")),
                    Err(e) => {
                        error!(id, address, error = %e, "Failed to look up IP address");
                        plan.skipped += 1;
                    }
                }
            }
        }
        Field::Interfaces => {
            for (&id, discrepancy) in report {
                let missing: Vec<DiscoveredInterface> =
                    match serde_json::from_value(discrepancy.expected.clone()) {
                        Ok(missing) => missing,
                        Err(e) => {
                            plan.skip(id, &format!("unreadable interface list: {e}"));
                            continue;
                        }
                    };
                for iface in missing {
                    let mut interface = NewInterface::named(id, iface.name);
                    interface.kind = iface.form_factor.map(Value::from);
                    interface.mac_address = iface.mac_address;
                    plan.push(Change::CreateInterface(interface));
                }
            }
        }
        Field::Firmware => {
            for (&id, discrepancy) in report {
                let Some(versions) = discrepancy.expected.as_object() else {
                    plan.skip(id, "expected value is not a map");
                    continue;
                };
                match merged_custom_fields(ctx, id, versions.clone()).await {
                    Ok(custom_fields) => plan.push(Change::PatchDevice {
                        id,
                        patch: DevicePatch {
                            custom_fields: Some(custom_fields),
                            ..Default::default()
                        },
                    }),
                    Err(e) => {
                        error!(id, error = %format!("{e:#}"), "Failed to prepare firmware update");
                        plan.skipped += 1;
                    }
                }
            }
        }
        Field::Platform => {
            let platforms = ctx
                .netbox
                .platforms()
                .await
                .context("failed to fetch NetBox platforms")?;
            for (&id, discrepancy) in report {
                let Some(slug) = expected_str(id, discrepancy, &mut plan) else {
                    continue;
                };
                match platforms.iter().find(|platform| platform.slug == slug) {
                    Some(platform) => plan.push(Change::PatchDevice {
                        id,
                        patch: DevicePatch {
                            platform: Some(platform.id),
                            ..Default::default()
                        },
                    }),
                    None => plan.skip(id, &format!("unknown platform {slug:?}")),
                }
            }
        }
        Field::SwitchConnections => ensure_updatable(field)?,
    }

    Ok(plan)
}

/// Fail for fields that have no updater.
pub fn ensure_updatable(field: Field) -> anyhow::Result<()> {
    if field == Field::SwitchConnections {
        bail!("{field} has no updater, run `create interfaces` instead");
    }
    Ok(())
}

/// Perform the planned writes. With `dry_run` nothing is written.
pub async fn apply(ctx: &Context, plan: &Plan, dry_run: bool) -> Summary {
    let mut summary = Summary {
        planned: plan.changes.len(),
        skipped: plan.skipped,
        ..Default::default()
    };

    for change in &plan.changes {
        if dry_run {
            info!(%change, body = %change.body(), "Dry run, not writing");
            continue;
        }

        let result = match change {
            Change::PatchDevice { id, patch } => ctx.netbox.patch_device(*id, patch).await,
            Change::PatchInterface { id, patch } => ctx.netbox.patch_interface(*id, patch).await,
            Change::CreateInterface(interface) => {
                ctx.netbox.create_interface(interface).await.map(drop)
            }
        };
        match result {
            Ok(()) => summary.applied += 1,
            Err(_) => summary.failed += 1,
        }
    }

    summary
}

/// Push the expected values of `report` back to NetBox.
pub async fn update(
    ctx: &Context,
    field: Field,
    report: &Report,
    dry_run: bool,
) -> anyhow::Result<Summary> {
    info!(%field, discrepancies = report.len(), dry_run, "Updating NetBox");
    let plan = plan(ctx, field, report).await?;
    let summary = apply(ctx, &plan, dry_run).await;
    info!(
        %field,
        planned = summary.planned,
        applied = summary.applied,
        failed = summary.failed,
        skipped = summary.skipped,
        "Update finished"
    );
    Ok(summary)
}

/// Validate `field` and push the corrections to NetBox.
pub async fn run(ctx: &Context, field: Field, dry_run: bool) -> anyhow::Result<Summary> {
    ensure_updatable(field)?;
    let report = validators::validate(ctx, field)
        .await
        .with_context(|| format!("{field} validation failed"))?;
    update(ctx, field, &report, dry_run).await
}
