//! BMC queries through `ipmitool`
//!
//! Every invocation talks IPMI v2 (`-I lanplus`) to the BMC named by a
//! device's IPMI location. The password is handed over in the
//! `IPMI_PASSWORD` environment variable (`-E`) so it never shows up in the
//! process list.

use crate::config::{ConfigError, IpmiConfig};
use macaddr::MacAddr6;
use maasbox_core::firmware::{parse_firmware_versions, parse_lan_mac};
use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum IpmiError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{host}: no answer within {}s", .timeout.as_secs())]
    Timeout { host: String, timeout: Duration },
    #[error("{host}: ipmitool exited with {code:?}: {stderr}")]
    Failed {
        host: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("invalid IPMI location '{0}'")]
    Location(String),
}

/// Host part of an IPMI web location such as `https://0CC47A010203.ipmi.example.org`.
pub fn ipmi_host(location: &str) -> Result<String, IpmiError> {
    url::Url::parse(location)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .ok_or_else(|| IpmiError::Location(location.to_string()))
}

#[derive(Clone, Debug)]
pub struct IpmiClient {
    config: IpmiConfig,
    timeout: Duration,
}

impl IpmiClient {
    pub fn new(config: &IpmiConfig) -> Self {
        Self {
            config: config.clone(),
            timeout: config.timeout(),
        }
    }

    async fn run(&self, host: &str, args: &[&str]) -> Result<String, IpmiError> {
        let (username, password) = self.config.credentials()?;
        let tool = &self.config.tool;

        debug!(host, command = %args.join(" "), "Running ipmitool");
        let child = Command::new(tool)
            .args(["-I", "lanplus", "-H", host, "-U", username, "-E"])
            .args(args)
            .env("IPMI_PASSWORD", password)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| IpmiError::Spawn {
                tool: tool.clone(),
                source,
            })?;

        // Dropping the child on timeout kills it
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| IpmiError::Timeout {
                host: host.to_string(),
                timeout: self.timeout,
            })?
            .map_err(|source| IpmiError::Spawn {
                tool: tool.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(IpmiError::Failed {
                host: host.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// MAC address of the BMC's LAN channel.
    pub async fn mac_address(&self, host: &str) -> Result<Option<MacAddr6>, IpmiError> {
        let output = self.run(host, &["lan", "print"]).await?;
        Ok(parse_lan_mac(&output))
    }

    /// BMC and system firmware versions keyed by NetBox custom field.
    ///
    /// Not every BMC implements the system info query, so its failure only
    /// drops the BIOS version.
    pub async fn firmware_versions(&self, host: &str) -> Result<BTreeMap<String, String>, IpmiError> {
        let mc_info = self.run(host, &["mc", "info"]).await?;
        let system_fw = match self
            .run(host, &["mc", "getsysinfo", "system_fw_version"])
            .await
        {
            Ok(output) => output,
            Err(e @ IpmiError::Failed { .. }) => {
                warn!(host, error = %e, "System firmware version unavailable");
                String::new()
            }
            Err(e) => return Err(e),
        };
        Ok(parse_firmware_versions(&mc_info, &system_fw))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn config(tool: &str) -> IpmiConfig {
        IpmiConfig {
            username: Some("ADMIN".to_string()),
            password: Some("s3cret".to_string()),
            dns_zone: Some("ipmi.example.org".to_string()),
            tool: tool.to_string(),
            timeout_secs: 5,
        }
    }

    /// A stand-in for ipmitool that answers from a shell script.
    fn fake_tool(dir: &tempfile::TempDir, script: &str) -> String {
        let path = dir.path().join("ipmitool");
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    #[test]
    fn test_ipmi_host() {
        assert_eq!(
            ipmi_host("https://0CC47A010203.ipmi.example.org").unwrap(),
            "0cc47a010203.ipmi.example.org"
        );
        assert!(ipmi_host("not a url").is_err());
    }

    #[tokio::test]
    async fn test_arguments_keep_password_out_of_argv() {
        let client = IpmiClient::new(&config("echo"));
        let output = client.run("bmc01", &["lan", "print"]).await.unwrap();
        assert_eq!(output.trim(), "-I lanplus -H bmc01 -U ADMIN -E lan print");
    }

    #[tokio::test]
    async fn test_mac_address() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_tool(
            &dir,
            r#"[ "$IPMI_PASSWORD" = "s3cret" ] || exit 1
echo "IP Address              : 10.1.0.21"
echo "MAC Address             : 0c:c4:7a:aa:bb:cc""#,
        );
        let client = IpmiClient::new(&config(&tool));
        let mac = client.mac_address("bmc01").await.unwrap().unwrap();
        assert_eq!(mac.to_string(), "0C:C4:7A:AA:BB:CC");
    }

    #[tokio::test]
    async fn test_firmware_versions_without_sysinfo() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_tool(
            &dir,
            r#"case "$*" in
  *getsysinfo*) echo "Invalid command" >&2; exit 1 ;;
  *) echo "Firmware Revision         : 3.77" ;;
esac"#,
        );
        let client = IpmiClient::new(&config(&tool));
        let versions = client.firmware_versions("bmc01").await.unwrap();
        assert_eq!(versions.get("BMC").map(String::as_str), Some("3.77"));
        assert!(!versions.contains_key("BIOS"));
    }

    #[tokio::test]
    async fn test_failures() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_tool(&dir, "echo 'Unable to establish session' >&2; exit 1");
        let err = IpmiClient::new(&config(&tool))
            .mac_address("bmc01")
            .await
            .unwrap_err();
        assert!(matches!(err, IpmiError::Failed { code: Some(1), .. }));

        let err = IpmiClient::new(&config("/nonexistent/ipmitool"))
            .mac_address("bmc01")
            .await
            .unwrap_err();
        assert!(matches!(err, IpmiError::Spawn { .. }));

        let mut missing = config("echo");
        missing.password = None;
        let err = IpmiClient::new(&missing).mac_address("bmc01").await.unwrap_err();
        assert!(matches!(err, IpmiError::Config(_)));
    }

    #[tokio::test]
    async fn test_timeout_kills_tool() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_tool(&dir, "sleep 10");
        let mut client = IpmiClient::new(&config(&tool));
        client.timeout = Duration::from_millis(200);
        let err = client.mac_address("bmc01").await.unwrap_err();
        assert!(matches!(err, IpmiError::Timeout { .. }));
    }
}
