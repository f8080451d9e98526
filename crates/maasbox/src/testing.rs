//! Test fixtures: a [`Context`] wired to mock NetBox and MaaS servers.

use crate::config::Config;
use crate::context::Context;
use httpmock::{Method::GET, MockServer};
use serde_json::{json, Value};

pub struct Fixture {
    pub netbox: MockServer,
    pub maas: MockServer,
    pub ctx: Context,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let netbox = MockServer::start();
        let maas = MockServer::start();

        let mut config = Config::default();
        config.netbox.url = netbox.url("/api");
        config.netbox.token = "t0k3n".to_string();
        config.netbox.site = "lar".to_string();
        config.netbox.device_type_ids = vec![3];
        config.maas.url = maas.url("/MAAS");
        config.maas.api_key = "ck:tk:ts".to_string();
        config.http.retry_max_elapsed_secs = 1;
        config.ipmi.username = Some("ADMIN".to_string());
        config.ipmi.password = Some("s3cret".to_string());
        config.ipmi.dns_zone = Some("ipmi.example.org".to_string());
        adjust(&mut config);

        let ctx = Context::new(config).unwrap();
        Self { netbox, maas, ctx }
    }

    /// Serve `devices` as the site's device list.
    pub fn devices(&self, devices: Value) {
        self.netbox.mock(|when, then| {
            when.method(GET)
                .path("/api/dcim/devices/")
                .query_param("site", "lar");
            then.status(200)
                .json_body(json!({"count": null, "next": null, "results": devices}));
        });
    }

    /// Serve `machines` from the MaaS machines endpoint.
    pub fn machines(&self, machines: Value) {
        self.maas.mock(|when, then| {
            when.method(GET).path("/MAAS/api/2.0/machines/");
            then.status(200).json_body(machines);
        });
    }

    /// Serve commissioning details for a machine.
    pub fn details(&self, system_id: &str, lshw: Option<&str>, lldp: Option<&str>) {
        let mut document = bson::Document::new();
        for (key, xml) in [("lshw", lshw), ("lldp", lldp)] {
            if let Some(xml) = xml {
                document.insert(
                    key,
                    bson::Binary {
                        subtype: bson::spec::BinarySubtype::Generic,
                        bytes: xml.as_bytes().to_vec(),
                    },
                );
            }
        }
        let body = bson::to_vec(&document).unwrap();
        let path = format!("/MAAS/api/2.0/machines/{system_id}/");
        self.maas.mock(|when, then| {
            when.method(GET).path(path).query_param("op", "details");
            then.status(200).body(body);
        });
    }

    /// Serve the interfaces of a device. Also matches name-filtered
    /// lookups, so do not combine with [`Fixture::interface_named`] for the
    /// same device.
    pub fn interfaces(&self, device_id: i64, interfaces: Value) {
        self.netbox.mock(|when, then| {
            when.method(GET)
                .path("/api/dcim/interfaces/")
                .query_param("device_id", device_id.to_string());
            then.status(200)
                .json_body(json!({"next": null, "results": interfaces}));
        });
    }

    /// Serve the interfaces of a device filtered by name.
    pub fn interface_named(&self, device_id: i64, name: &str, interfaces: Value) {
        self.netbox.mock(|when, then| {
            when.method(GET)
                .path("/api/dcim/interfaces/")
                .query_param("device_id", device_id.to_string())
                .query_param("name", name);
            then.status(200)
                .json_body(json!({"next": null, "results": interfaces}));
        });
    }
}

pub fn machine(hostname: &str, status: u8) -> Value {
    json!({
        "system_id": format!("{hostname}-id"),
        "hostname": hostname,
        "status": status,
        "osystem": "ubuntu",
        "distro_series": "bionic",
        "interface_set": []
    })
}

pub fn device(id: i64, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "serial": "",
        "status": {"value": 1, "label": "Active"},
        "primary_ip4": null,
        "platform": null,
        "custom_fields": {}
    })
}
