//! IPMI validators
//!
//! `ipmi` checks that a device's IPMI custom field points at the web
//! interface named after its management interface MAC. `ipmi-interface`
//! asks the BMC for its MAC and checks it against the management interface
//! NetBox declares.

use crate::clients::ipmi::ipmi_host;
use crate::clients::ClientError;
use crate::context::Context;
use macaddr::MacAddr6;
use maasbox_core::{mac, Device, Discrepancy, Interface, Report};
use thiserror::Error;
use tracing::{debug, error};

/// Why a device could not be checked.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IpmiProblem {
    #[error("No IPMI location declared")]
    NoLocation,
    #[error("No IPMI interface found at NetBox")]
    NoInterface,
    #[error("IPMI interface has no MAC address at NetBox")]
    NoMacAddress,
    #[error("Erroneous IPMI MAC address found on NetBox")]
    ZeroMacAddress,
}

/// `https://<MAC without colons>.<zone>`
pub fn expected_location(mac_address: &MacAddr6, dns_zone: &str) -> String {
    format!("https://{}.{}", mac::compact(mac_address), dns_zone)
}

/// Compare the declared IPMI location with the one the management
/// interface implies.
pub fn compare_location(
    device: &Device,
    mgmt: Option<&Interface>,
    dns_zone: &str,
) -> Result<Option<Discrepancy>, IpmiProblem> {
    let declared = device.ipmi_location().ok_or(IpmiProblem::NoLocation)?;
    let mgmt = mgmt.ok_or(IpmiProblem::NoInterface)?;
    let mac_address = mgmt.mac_address.ok_or(IpmiProblem::NoMacAddress)?;
    if mac_address.is_nil() {
        return Err(IpmiProblem::ZeroMacAddress);
    }

    let expected = expected_location(&mac_address, dns_zone);
    Ok((declared != expected).then(|| Discrepancy::new(declared, expected)))
}

pub async fn check_locations(ctx: &Context, devices: &[Device]) -> anyhow::Result<Report> {
    debug!("Checking IPMI web addresses declared at NetBox");
    let dns_zone = ctx.config.ipmi.dns_zone()?;
    let mut report = Report::new();

    for device in devices {
        if device.ipmi_location().is_none() {
            error!(device = %device.name, "{}", IpmiProblem::NoLocation);
            continue;
        }
        let mgmt = match ctx.netbox.ipmi_interface(device.id).await {
            Ok(mgmt) => mgmt,
            Err(e) => {
                error!(device = %device.name, error = %e, "Failed to fetch IPMI interface");
                continue;
            }
        };

        match compare_location(device, mgmt.as_ref(), dns_zone) {
            Ok(Some(discrepancy)) => {
                debug!(
                    device = %device.name,
                    declared = %discrepancy.current,
                    expected = %discrepancy.expected,
                    "IPMI location mismatch"
                );
                report.insert(device.id, discrepancy);
            }
            Ok(None) => {}
            Err(problem) => error!(device = %device.name, "{problem}"),
        }
    }

    Ok(report)
}

/// Compare the MAC NetBox declares for the management interface with the
/// one the BMC reports.
pub fn compare_interface(mgmt: &Interface, actual: MacAddr6) -> Option<Discrepancy> {
    (mgmt.mac_address != Some(actual)).then(|| {
        Discrepancy::new(mgmt.mac_address.map(|m| m.to_string()), actual.to_string())
    })
}

pub async fn check_interfaces(ctx: &Context, devices: &[Device]) -> anyhow::Result<Report> {
    debug!("Checking MAC addresses of the IPMI interfaces declared at NetBox");
    ctx.config.ipmi.credentials()?;
    let mut report = Report::new();

    for device in devices {
        match check_interface(ctx, device).await {
            Ok(Some((id, discrepancy))) => {
                debug!(
                    device = %device.name,
                    declared = %discrepancy.current,
                    actual = %discrepancy.expected,
                    "IPMI MAC address mismatch"
                );
                report.insert(id, discrepancy);
            }
            Ok(None) => {}
            Err(e) => error!(device = %device.name, error = %e, "IPMI interface check failed"),
        }
    }

    Ok(report)
}

#[derive(Debug, Error)]
enum CheckError {
    #[error(transparent)]
    Problem(#[from] IpmiProblem),
    #[error(transparent)]
    Ipmi(#[from] crate::clients::IpmiError),
    #[error(transparent)]
    NetBox(#[from] ClientError),
    #[error("Could not fetch actual IPMI MAC address")]
    NoAnswer,
}

async fn check_interface(
    ctx: &Context,
    device: &Device,
) -> Result<Option<(i64, Discrepancy)>, CheckError> {
    let location = device.ipmi_location().ok_or(IpmiProblem::NoLocation)?;
    let host = ipmi_host(location)?;
    let actual = ctx
        .ipmi
        .mac_address(&host)
        .await?
        .ok_or(CheckError::NoAnswer)?;
    let mgmt = ctx
        .netbox
        .ipmi_interface(device.id)
        .await?
        .ok_or(IpmiProblem::NoInterface)?;

    Ok(compare_interface(&mgmt, actual).map(|d| (mgmt.id, d)))
}
