//! Remote API clients
//!
//! - [`NetBoxClient`] - NetBox REST API (token auth)
//! - [`MaasClient`] - MaaS 2.0 API (OAuth 1.0 PLAINTEXT)
//! - [`IpmiClient`] - BMC queries through `ipmitool`
//!
//! Reads are idempotent and retried with exponential backoff on transport
//! errors and server-side failures. Writes are attempted once.

pub mod ipmi;
pub mod maas;
pub mod netbox;

pub use ipmi::{IpmiClient, IpmiError};
pub use maas::{MaasClient, MachineDetails};
pub use netbox::NetBoxClient;

use crate::config::HttpConfig;
use backoff::{future::retry, ExponentialBackoff};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decode BSON from {url}: {source}")]
    Bson {
        url: String,
        #[source]
        source: bson::de::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
}

impl ClientError {
    fn transport(url: &str, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.to_string(),
            source,
        }
    }

    /// Whether repeating the request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }

    /// HTTP status of a rejected request.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Backoff settings for idempotent reads.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub max_elapsed: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &HttpConfig) -> Self {
        Self {
            initial_interval: Duration::from_millis(250),
            max_interval: Duration::from_secs(5),
            max_elapsed: config.retry_max_elapsed(),
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            current_interval: self.initial_interval,
            max_interval: self.max_interval,
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or the policy gives up.
pub(crate) async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    retry(policy.backoff(), || {
        let attempt = op();
        async move {
            match attempt.await {
                Ok(value) => Ok(value),
                Err(e) if e.is_transient() => {
                    warn!(what, error = %e, "Request failed, retrying");
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        }
    })
    .await
}

pub(crate) fn http_client(
    config: &HttpConfig,
    headers: reqwest::header::HeaderMap,
) -> Result<reqwest::Client, ClientError> {
    reqwest::Client::builder()
        .user_agent(crate::version::USER_AGENT)
        .timeout(config.timeout())
        .pool_idle_timeout(Duration::from_secs(90))
        .default_headers(headers)
        .build()
        .map_err(ClientError::Build)
}

/// Turn a non-2xx response into [`ClientError::Status`].
pub(crate) async fn check_status(
    url: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        url: url.to_string(),
        status: status.as_u16(),
        body,
    })
}

pub(crate) async fn read_body(
    url: &str,
    response: reqwest::Response,
) -> Result<Vec<u8>, ClientError> {
    let response = check_status(url, response).await?;
    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| ClientError::transport(url, e))
}

pub(crate) async fn decode_json<T: DeserializeOwned>(
    url: &str,
    response: reqwest::Response,
) -> Result<T, ClientError> {
    let body = read_body(url, response).await?;
    serde_json::from_slice(&body).map_err(|source| ClientError::Decode {
        url: url.to_string(),
        source,
    })
}
