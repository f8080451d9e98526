//! Creators
//!
//! Bootstrap NetBox records from what MaaS observed on deployed machines.
//! Unlike updaters they do not start from a validation report.

pub mod interfaces;
pub mod ipmi_interface;

use crate::context::Context;
use anyhow::Context as _;
use clap::ValueEnum;
use strum::{Display, EnumString};
use tracing::info;

/// A record creator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum Creator {
    /// Virtual interfaces, addresses and cabling of deployed machines
    Interfaces,
    /// A management interface described by `--data`
    IpmiInterface,
}

/// Run a creator. `data` is the JSON document `ipmi-interface` requires.
pub async fn create(ctx: &Context, creator: Creator, data: Option<&str>) -> anyhow::Result<()> {
    info!(%creator, "Creating NetBox records");

    match creator {
        Creator::Interfaces => {
            ctx.config.netbox.site()?;
            let summary = interfaces::run(ctx).await?;
            info!(
                nodes = summary.nodes,
                failed = summary.failed,
                "Interface bootstrap finished"
            );
            if summary.failed > 0 {
                anyhow::bail!("{} of {} nodes failed", summary.failed, summary.nodes);
            }
        }
        Creator::IpmiInterface => {
            let data = data.context("ipmi-interface requires --data")?;
            let data = ipmi_interface::IpmiInterfaceData::parse(data)?;
            let id = ipmi_interface::create(ctx, &data).await?;
            info!(id, device = data.node, "IPMI interface created");
        }
    }

    Ok(())
}
