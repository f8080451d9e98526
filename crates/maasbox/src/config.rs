//! Configuration
//!
//! Settings come from built-in defaults, an optional YAML file, and then
//! environment variables, in increasing order of precedence.
//!
//! Environment variables:
//! - `MAAS_URL`, `MAAS_API_KEY` - MaaS endpoint and `consumer:token:secret` API key
//! - `NETBOX_URL`, `NETBOX_TOKEN` - NetBox API root (e.g. `https://netbox/api`) and token
//! - `NETBOX_DEVICE_IDS` - comma-separated device type ids to reconcile
//! - `SITE` - NetBox site slug
//! - `IPMI_USERNAME`, `IPMI_PASSWORD`, `IPMI_DNS_ZONE` - BMC access

use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("{0} is not configured")]
    Missing(&'static str),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Full configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub maas: MaasConfig,
    pub netbox: NetBoxConfig,
    pub ipmi: IpmiConfig,
    pub filters: FilterConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaasConfig {
    /// MaaS root, e.g. `http://maas:5240/MAAS` (env: MAAS_URL)
    pub url: String,
    /// API key (env: MAAS_API_KEY)
    pub api_key: String,
    /// Interface whose first address is the machine's primary IPv4
    pub primary_interface: String,
}

impl Default for MaasConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            primary_interface: "bond0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetBoxConfig {
    /// API root (env: NETBOX_URL)
    pub url: String,
    /// API token (env: NETBOX_TOKEN)
    pub token: String,
    /// Site slug the reconciled devices live in (env: SITE)
    pub site: String,
    /// Device types to reconcile (env: NETBOX_DEVICE_IDS)
    pub device_type_ids: Vec<u32>,
}

impl NetBoxConfig {
    /// Site slug, required by commands that list the site's devices.
    pub fn site(&self) -> Result<&str, ConfigError> {
        Some(self.site.as_str())
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("SITE"))
    }
}

/// Comma-separated device type ids. Any token that is not an id is an error.
fn parse_device_type_ids(ids: &str) -> Result<Vec<u32>, ConfigError> {
    ids.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse().map_err(|_| {
                ConfigError::Invalid(format!("NETBOX_DEVICE_IDS: '{id}' is not a device type id"))
            })
        })
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IpmiConfig {
    /// env: IPMI_USERNAME
    pub username: Option<String>,
    /// env: IPMI_PASSWORD
    pub password: Option<String>,
    /// DNS zone BMC host names live in (env: IPMI_DNS_ZONE)
    pub dns_zone: Option<String>,
    /// ipmitool executable
    pub tool: String,
    /// Per-invocation timeout
    pub timeout_secs: u64,
}

impl Default for IpmiConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            dns_zone: None,
            tool: "ipmitool".to_string(),
            timeout_secs: 15,
        }
    }
}

impl IpmiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Username and password, required by checks that talk to BMCs.
    pub fn credentials(&self) -> Result<(&str, &str), ConfigError> {
        let username = self
            .username
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("IPMI_USERNAME"))?;
        let password = self
            .password
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("IPMI_PASSWORD"))?;
        Ok((username, password))
    }

    pub fn dns_zone(&self) -> Result<&str, ConfigError> {
        self.dns_zone
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("IPMI_DNS_ZONE"))
    }
}

/// Which nodes take part in reconciliation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    /// Only MaaS machines whose hostname starts with this prefix
    pub maas_hostname_prefix: Option<String>,
    /// NetBox devices whose name ends with one of these are skipped
    pub netbox_excluded_suffixes: Vec<String>,
}

impl FilterConfig {
    pub fn accepts_hostname(&self, hostname: &str) -> bool {
        match self.maas_hostname_prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => hostname.starts_with(prefix),
            _ => true,
        }
    }

    pub fn accepts_device_name(&self, name: &str) -> bool {
        !self
            .netbox_excluded_suffixes
            .iter()
            .any(|suffix| !suffix.is_empty() && name.ends_with(suffix.as_str()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// Request timeout
    pub timeout_secs: u64,
    /// Give up retrying reads after this long
    pub retry_max_elapsed_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            retry_max_elapsed_secs: 30,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_max_elapsed(&self) -> Duration {
        Duration::from_secs(self.retry_max_elapsed_secs)
    }
}

/// MaaS API key, `consumer_key:token_key:token_secret`.
#[derive(Clone, PartialEq, Eq)]
pub struct MaasApiKey {
    pub consumer_key: String,
    pub token_key: String,
    pub token_secret: String,
}

impl std::fmt::Debug for MaasApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaasApiKey")
            .field("consumer_key", &self.consumer_key)
            .field("token_key", &self.token_key)
            .finish_non_exhaustive()
    }
}

impl FromStr for MaasApiKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        match parts.as_slice() {
            [consumer, token, secret]
                if !consumer.is_empty() && !token.is_empty() && !secret.is_empty() =>
            {
                Ok(Self {
                    consumer_key: consumer.to_string(),
                    token_key: token.to_string(),
                    token_secret: secret.to_string(),
                })
            }
            _ => Err(ConfigError::Invalid(
                "MAAS_API_KEY must have the form consumer_key:token_key:token_secret".into(),
            )),
        }
    }
}

impl Config {
    /// Load configuration from an optional YAML file and the process
    /// environment, then validate it.
    pub async fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path).await?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    async fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Override settings from environment-style variables.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = var("MAAS_URL") {
            self.maas.url = url;
        }
        if let Some(key) = var("MAAS_API_KEY") {
            self.maas.api_key = key;
        }
        if let Some(url) = var("NETBOX_URL") {
            self.netbox.url = url;
        }
        if let Some(token) = var("NETBOX_TOKEN") {
            self.netbox.token = token;
        }
        if let Some(site) = var("SITE") {
            self.netbox.site = site;
        }
        if let Some(ids) = var("NETBOX_DEVICE_IDS") {
            self.netbox.device_type_ids = parse_device_type_ids(&ids)?;
        }
        if let Some(username) = var("IPMI_USERNAME") {
            self.ipmi.username = Some(username);
        }
        if let Some(password) = var("IPMI_PASSWORD") {
            self.ipmi.password = Some(password);
        }
        if let Some(zone) = var("IPMI_DNS_ZONE") {
            self.ipmi.dns_zone = Some(zone);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.maas.url.is_empty() {
            return Err(ConfigError::Missing("MAAS_URL"));
        }
        if self.maas.api_key.is_empty() {
            return Err(ConfigError::Missing("MAAS_API_KEY"));
        }
        self.maas.api_key.parse::<MaasApiKey>()?;
        if self.netbox.url.is_empty() {
            return Err(ConfigError::Missing("NETBOX_URL"));
        }
        if self.netbox.token.is_empty() {
            return Err(ConfigError::Missing("NETBOX_TOKEN"));
        }
        for (name, url) in [("MAAS_URL", &self.maas.url), ("NETBOX_URL", &self.netbox.url)] {
            url::Url::parse(url)
                .map_err(|e| ConfigError::Invalid(format!("{name} '{url}': {e}")))?;
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Invalid("http.timeout_secs must be positive".into()));
        }
        if self.ipmi.timeout_secs == 0 {
            return Err(ConfigError::Invalid("ipmi.timeout_secs must be positive".into()));
        }
        Ok(())
    }

    /// The parsed MaaS API key. Only valid after [`Config::validate`].
    pub fn maas_api_key(&self) -> Result<MaasApiKey, ConfigError> {
        self.maas.api_key.parse()
    }
}
