//! Firmware version validator

use crate::clients::ipmi::ipmi_host;
use crate::context::Context;
use maasbox_core::{Device, Discrepancy, Report};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, error};

/// Compare declared firmware custom fields with the versions the BMC
/// reports. Only mismatching fields appear in the discrepancy.
pub fn compare(
    custom_fields: &Map<String, Value>,
    reported: &BTreeMap<String, String>,
) -> Option<Discrepancy> {
    let mut current = Map::new();
    let mut expected = Map::new();

    for (field, version) in reported {
        let declared = custom_fields.get(field).and_then(Value::as_str);
        if declared != Some(version.as_str()) {
            debug!(firmware = %field, declared = ?declared, actual = %version, "Firmware mismatch");
            current.insert(field.clone(), declared.map_or(Value::Null, Value::from));
            expected.insert(field.clone(), Value::from(version.as_str()));
        }
    }

    (!expected.is_empty()).then(|| Discrepancy::new(current, expected))
}

pub async fn check(ctx: &Context, devices: &[Device]) -> anyhow::Result<Report> {
    debug!("Checking firmware versions declared at NetBox");
    ctx.config.ipmi.credentials()?;
    let mut report = Report::new();

    for device in devices {
        let Some(location) = device.ipmi_location() else {
            error!(device = %device.name, "No IPMI location declared");
            continue;
        };
        let versions = match ipmi_host(location) {
            Ok(host) => ctx.ipmi.firmware_versions(&host).await,
            Err(e) => Err(e),
        };

        match versions {
            Ok(versions) => {
                if let Some(discrepancy) = compare(&device.custom_fields, &versions) {
                    debug!(device = %device.name, "Firmware versions differ");
                    report.insert(device.id, discrepancy);
                }
            }
            Err(e) => error!(device = %device.name, error = %e, "Failed to read firmware versions"),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn versions(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_compare() {
        let fields = json!({"IPMI": "https://x", "BMC": "3.77", "BIOS": "2.0b"});
        let fields = fields.as_object().unwrap();

        assert_eq!(compare(fields, &versions(&[("BMC", "3.77"), ("BIOS", "2.0b")])), None);
        assert_eq!(compare(fields, &versions(&[])), None);

        let d = compare(fields, &versions(&[("BMC", "3.77"), ("BIOS", "3.1a")])).unwrap();
        assert_eq!(d.current, json!({"BIOS": "2.0b"}));
        assert_eq!(d.expected, json!({"BIOS": "3.1a"}));
    }

    #[test]
    fn test_compare_undeclared_fields() {
        let fields = json!({"BMC": null});
        let d = compare(fields.as_object().unwrap(), &versions(&[("BMC", "3.77")])).unwrap();
        assert_eq!(d.current, json!({"BMC": null}));
        assert_eq!(d.expected, json!({"BMC": "3.77"}));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_check_with_fake_ipmitool() {
        use crate::testing::Fixture;
        use crate::validators::{validate, Field};
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("ipmitool");
        std::fs::write(
            &tool,
            "#!/bin/sh\ncase \"$*\" in\n  *getsysinfo*) echo 3.1a ;;\n  *) echo 'Firmware Revision : 3.77' ;;\nesac\n",
        )
        .unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let fixture = Fixture::with_config(|config| config.ipmi.tool = tool.display().to_string());
        fixture.devices(json!([
            {"id": 7, "name": "LAR0101",
             "custom_fields": {"IPMI": "https://0CC47A010203.ipmi.example.org", "BMC": "3.77", "BIOS": "2.0b"}},
            {"id": 8, "name": "LAR0102", "custom_fields": {"IPMI": null}}
        ]));

        let report = validate(&fixture.ctx, Field::Firmware).await.unwrap();

        assert_eq!(report.len(), 1);
        assert_eq!(report[&7].expected, json!({"BIOS": "3.1a"}));
    }
}
