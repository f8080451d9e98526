//! MaaS 2.0 API client
//!
//! Requests are signed with OAuth 1.0 using the PLAINTEXT method: the
//! consumer secret is empty and the signature is `&<token secret>`,
//! percent-encoded. A fresh nonce and timestamp go with every request.

use super::{decode_json, http_client, read_body, with_retry, ClientError, RetryPolicy};
use crate::config::{HttpConfig, MaasApiKey, MaasConfig};
use bson::{Bson, Document};
use maasbox_core::lldp::{switch_connections, SwitchConnection};
use maasbox_core::lshw::{DiscoveredInterface, HardwareDetails};
use maasbox_core::Machine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use tracing::{debug, warn};

/// Client for the machines endpoints of a MaaS region controller.
#[derive(Clone)]
pub struct MaasClient {
    http: reqwest::Client,
    base: String,
    key: MaasApiKey,
    retry: RetryPolicy,
}

impl MaasClient {
    pub fn new(config: &MaasConfig, key: MaasApiKey, http: &HttpConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(Self {
            http: http_client(http, headers)?,
            base: format!("{}/api/2.0", config.url.trim_end_matches('/')),
            key,
            retry: RetryPolicy::from_config(http),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    fn authorization(&self) -> Result<HeaderValue, ClientError> {
        let mut value = HeaderValue::from_str(&oauth_header(
            &self.key,
            &uuid::Uuid::new_v4().simple().to_string(),
            chrono::Utc::now().timestamp(),
        ))?;
        value.set_sensitive(true);
        Ok(value)
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::Response, ClientError> {
        debug!(url, "GET");
        self.http
            .get(url)
            .query(query)
            .header(AUTHORIZATION, self.authorization()?)
            .send()
            .await
            .map_err(|e| ClientError::transport(url, e))
    }

    /// Every machine known to MaaS.
    pub async fn machines(&self) -> Result<Vec<Machine>, ClientError> {
        let url = self.url("machines/");
        let url = url.as_str();
        with_retry(&self.retry, url, || async move {
            let response = self.get(url, &[]).await?;
            decode_json(url, response).await
        })
        .await
    }

    /// Commissioning output stored for a machine.
    pub async fn machine_details(&self, system_id: &str) -> Result<MachineDetails, ClientError> {
        let url = self.url(&format!("machines/{system_id}/"));
        let url = url.as_str();
        let body = with_retry(&self.retry, url, || async move {
            let response = self.get(url, &[("op", "details")]).await?;
            read_body(url, response).await
        })
        .await?;

        let document: Document = bson::from_slice(&body).map_err(|source| ClientError::Bson {
            url: url.to_string(),
            source,
        })?;
        Ok(MachineDetails::from_document(system_id, &document))
    }
}

fn oauth_header(key: &MaasApiKey, nonce: &str, timestamp: i64) -> String {
    format!(
        "OAuth oauth_version=\"1.0\", oauth_signature_method=\"PLAINTEXT\", \
         oauth_consumer_key=\"{}\", oauth_token=\"{}\", oauth_signature=\"%26{}\", \
         oauth_nonce=\"{}\", oauth_timestamp=\"{}\"",
        key.consumer_key, key.token_key, key.token_secret, nonce, timestamp
    )
}

/// The `lshw` and `lldp` XML documents MaaS collected while commissioning a
/// machine. Either may be absent.
#[derive(Clone, Debug, Default)]
pub struct MachineDetails {
    pub system_id: String,
    pub lshw: Option<String>,
    pub lldp: Option<String>,
}

impl MachineDetails {
    fn from_document(system_id: &str, document: &Document) -> Self {
        Self {
            system_id: system_id.to_string(),
            lshw: xml_entry(document, "lshw"),
            lldp: xml_entry(document, "lldp"),
        }
    }

    /// System serial number reported by lshw.
    pub fn serial(&self) -> Option<String> {
        let xml = self.lshw.as_deref()?;
        match HardwareDetails::parse(xml) {
            Ok(details) => details.system_serial(),
            Err(e) => {
                warn!(system_id = %self.system_id, error = %e, "Failed to parse lshw details");
                None
            }
        }
    }

    /// Network interfaces reported by lshw.
    pub fn interfaces(&self) -> Vec<DiscoveredInterface> {
        let Some(xml) = self.lshw.as_deref() else {
            return Vec::new();
        };
        match HardwareDetails::parse(xml) {
            Ok(details) => details.network_interfaces(),
            Err(e) => {
                warn!(system_id = %self.system_id, error = %e, "Failed to parse lshw details");
                Vec::new()
            }
        }
    }

    /// Switch ports the machine is cabled to, from LLDP.
    pub fn switch_connections(&self) -> Vec<SwitchConnection> {
        let Some(xml) = self.lldp.as_deref() else {
            return Vec::new();
        };
        switch_connections(xml).unwrap_or_else(|e| {
            warn!(system_id = %self.system_id, error = %e, "Failed to parse LLDP details");
            Vec::new()
        })
    }
}

/// Details entries are stored as binary blobs; older regions send strings.
fn xml_entry(document: &Document, key: &str) -> Option<String> {
    match document.get(key)? {
        Bson::Binary(binary) => String::from_utf8(binary.bytes.clone()).ok(),
        Bson::String(s) => Some(s.clone()),
        _ => None,
    }
    .filter(|s| !s.trim().is_empty())
}
