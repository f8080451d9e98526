//! Shared run context

use crate::clients::{ClientError, IpmiClient, MaasClient, NetBoxClient};
use crate::config::{Config, ConfigError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Configuration and clients shared by validators, updaters and creators.
pub struct Context {
    pub config: Config,
    pub netbox: NetBoxClient,
    pub maas: MaasClient,
    pub ipmi: IpmiClient,
}

impl Context {
    pub fn new(config: Config) -> Result<Self, ContextError> {
        let netbox = NetBoxClient::new(&config.netbox, &config.http)?;
        let maas = MaasClient::new(&config.maas, config.maas_api_key()?, &config.http)?;
        let ipmi = IpmiClient::new(&config.ipmi);

        Ok(Self {
            config,
            netbox,
            maas,
            ipmi,
        })
    }

    pub fn site(&self) -> &str {
        &self.config.netbox.site
    }
}
