//! NetBox REST client

use super::{check_status, decode_json, http_client, with_retry, ClientError, RetryPolicy};
use crate::config::{HttpConfig, NetBoxConfig};
use maasbox_core::netbox::{
    Cable, Choice, Created, Device, DevicePatch, Interface, InterfacePatch, IpAddress, NewCable,
    NewInterface, NewIpAddress, Page, Platform, Vlan,
};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info};

type Query = Vec<(&'static str, String)>;

/// Client for the DCIM and IPAM endpoints of a NetBox instance.
#[derive(Clone)]
pub struct NetBoxClient {
    http: reqwest::Client,
    base: String,
    retry: RetryPolicy,
}

impl NetBoxClient {
    pub fn new(config: &NetBoxConfig, http: &HttpConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        let mut token = HeaderValue::from_str(&format!("Token {}", config.token))?;
        token.set_sensitive(true);
        headers.insert(AUTHORIZATION, token);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(Self {
            http: http_client(http, headers)?,
            base: config.url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::from_config(http),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    async fn get<T: DeserializeOwned>(&self, url: &str, query: &Query) -> Result<T, ClientError> {
        with_retry(&self.retry, url, || async move {
            debug!(url, "GET");
            let response = self
                .http
                .get(url)
                .query(query)
                .send()
                .await
                .map_err(|e| ClientError::transport(url, e))?;
            decode_json(url, response).await
        })
        .await
    }

    /// Fetch every page of a list endpoint.
    async fn list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Query,
    ) -> Result<Vec<T>, ClientError> {
        let first: Page<T> = self.get(&self.url(path), &query).await?;
        let mut results = first.results;
        let mut next = first.next;

        // `next` already carries the query string
        while let Some(url) = next.take() {
            let page: Page<T> = self.get(&url, &Vec::new()).await?;
            results.extend(page.results);
            next = page.next;
        }

        Ok(results)
    }

    async fn patch<B: Serialize>(&self, what: &str, path: &str, body: &B) -> Result<(), ClientError> {
        let url = self.url(path);
        let result = async {
            let response = self
                .http
                .patch(&url)
                .json(body)
                .send()
                .await
                .map_err(|e| ClientError::transport(&url, e))?;
            check_status(&url, response).await.map(drop)
        }
        .await;

        match &result {
            Ok(()) => info!(url = %url, "{what} updated successfully"),
            Err(e) => error!(url = %url, error = %e, "Failed to update {what}"),
        }
        result
    }

    async fn create<B: Serialize>(&self, what: &str, path: &str, body: &B) -> Result<i64, ClientError> {
        let url = self.url(path);
        let result = async {
            let response = self
                .http
                .post(&url)
                .json(body)
                .send()
                .await
                .map_err(|e| ClientError::transport(&url, e))?;
            decode_json::<Created>(&url, response).await.map(|c| c.id)
        }
        .await;

        match &result {
            Ok(id) => info!(url = %url, id, "{what} created successfully"),
            Err(e) => error!(url = %url, error = %e, "Failed to create {what}"),
        }
        result
    }

    /// Devices of the given types at a site.
    pub async fn devices_by_site(
        &self,
        site: &str,
        device_type_ids: &[u32],
    ) -> Result<Vec<Device>, ClientError> {
        let mut query: Query = vec![("site", site.to_string()), ("limit", "0".to_string())];
        query.extend(
            device_type_ids
                .iter()
                .map(|id| ("device_type_id", id.to_string())),
        );
        self.list("dcim/devices/", query).await
    }

    /// First device with this exact name.
    pub async fn device_by_name(&self, name: &str) -> Result<Option<Device>, ClientError> {
        let devices: Vec<Device> = self
            .list("dcim/devices/", vec![("name", name.to_string())])
            .await?;
        Ok(devices.into_iter().next())
    }

    pub async fn device(&self, id: i64) -> Result<Device, ClientError> {
        self.get(&self.url(&format!("dcim/devices/{id}/")), &Vec::new())
            .await
    }

    pub async fn interface(&self, id: i64) -> Result<Interface, ClientError> {
        self.get(&self.url(&format!("dcim/interfaces/{id}/")), &Vec::new())
            .await
    }

    /// Interfaces of a device, optionally restricted to one name.
    pub async fn interfaces(
        &self,
        device_id: i64,
        name: Option<&str>,
    ) -> Result<Vec<Interface>, ClientError> {
        let mut query: Query = vec![("device_id", device_id.to_string()), ("limit", "0".to_string())];
        if let Some(name) = name {
            query.push(("name", name.to_string()));
        }
        self.list("dcim/interfaces/", query).await
    }

    /// The first management-only interface of a device.
    pub async fn ipmi_interface(&self, device_id: i64) -> Result<Option<Interface>, ClientError> {
        Ok(self
            .interfaces(device_id, None)
            .await?
            .into_iter()
            .find(|iface| iface.mgmt_only))
    }

    pub async fn platforms(&self) -> Result<Vec<Platform>, ClientError> {
        self.list("dcim/platforms/", vec![("limit", "0".to_string())])
            .await
    }

    pub async fn device_statuses(&self) -> Result<Vec<Choice>, ClientError> {
        self.get(&self.url("dcim/_choices/device:status/"), &Vec::new())
            .await
    }

    pub async fn interface_types(&self) -> Result<Vec<Choice>, ClientError> {
        self.get(&self.url("dcim/_choices/interface:type/"), &Vec::new())
            .await
    }

    /// The VLAN with this VID at a site.
    pub async fn vlan_of_site(&self, site: &str, vid: u16) -> Result<Option<Vlan>, ClientError> {
        let vlans: Vec<Vlan> = self
            .list(
                "ipam/vlans/",
                vec![("site", site.to_string()), ("vid", vid.to_string())],
            )
            .await?;
        Ok(vlans.into_iter().next())
    }

    /// IP address records matching `address`, with or without prefix length.
    pub async fn ip_addresses(&self, address: &str) -> Result<Vec<IpAddress>, ClientError> {
        self.list("ipam/ip-addresses/", vec![("address", address.to_string())])
            .await
    }

    /// The IP address record for `address`, when exactly one exists.
    pub async fn ip_address(&self, address: &str) -> Result<Option<IpAddress>, ClientError> {
        let mut found = self.ip_addresses(address).await?;
        Ok(if found.len() == 1 { found.pop() } else { None })
    }

    /// A cable joining two interfaces, in either orientation.
    pub async fn cable_between(&self, a: i64, b: i64) -> Result<Option<Cable>, ClientError> {
        let cables: Vec<Cable> = self
            .list("dcim/cables/", vec![("limit", "0".to_string())])
            .await?;
        Ok(cables.into_iter().find(|cable| cable.connects(a, b)))
    }

    pub async fn patch_device(&self, id: i64, patch: &DevicePatch) -> Result<(), ClientError> {
        self.patch("Device", &format!("dcim/devices/{id}/"), patch)
            .await
    }

    pub async fn patch_interface(&self, id: i64, patch: &InterfacePatch) -> Result<(), ClientError> {
        self.patch("Interface", &format!("dcim/interfaces/{id}/"), patch)
            .await
    }

    pub async fn create_interface(&self, interface: &NewInterface) -> Result<i64, ClientError> {
        self.create("Interface", "dcim/interfaces/", interface).await
    }

    pub async fn create_ip_address(&self, address: &NewIpAddress) -> Result<i64, ClientError> {
        self.create("IP Address", "ipam/ip-addresses/", address)
            .await
    }

    pub async fn create_cable(&self, cable: &NewCable) -> Result<i64, ClientError> {
        self.create("Cable", "dcim/cables/", cable).await
    }
}
