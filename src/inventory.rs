use eyre::{
    bail,
    Result,
};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;

pub const DEFAULT_ENDPOINT: &str = "https://compute.googleapis.com";

/// A VM's identity as reported by the inventory API: assigned addresses in
/// interface order, its label set, and where it lives.
#[derive(Clone, Debug, Default)]
pub struct VmInfo {
    pub ips: Vec<String>,
    pub labels: HashMap<String, String>,
    pub name: String,
    pub project: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Instance {
    name: String,
    #[serde(default)]
    labels: HashMap<String, String>,
    #[serde(default)]
    network_interfaces: Vec<NetworkInterface>,
}

#[derive(Debug, Deserialize)]
struct NetworkInterface {
    #[serde(rename = "networkIP")]
    network_ip: Option<String>,
}

/// Client for the Compute Engine v1 REST surface, used only to resolve a VM
/// identifier from an event into its current labels and addresses.
#[derive(Clone)]
pub struct ComputeApi {
    client: reqwest::Client,
    endpoint: String,
    access_token: String,
}

impl ComputeApi {
    pub fn new(endpoint: impl ToString, access_token: impl ToString) -> Self {
        ComputeApi {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            access_token: access_token.to_string(),
        }
    }

    /// Fetch a VM by project/zone/instance id. `Ok(None)` when the instance
    /// no longer exists, which callers treat as a no-op.
    pub async fn instance(&self, project: &str, zone: &str, instance: &str) -> Result<Option<VmInfo>> {
        let url = format!(
            "{}/compute/v1/projects/{project}/zones/{zone}/instances/{instance}",
            self.endpoint
        );

        let res = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if res.status() == StatusCode::NOT_FOUND {
            debug!(%project, %zone, %instance, "instance not found");
            return Ok(None);
        }
        if !res.status().is_success() {
            bail!(
                "compute api error: status={:?}, body={:?}",
                res.status(),
                res.text().await?
            );
        }

        let instance: Instance = res.json().await?;
        let ips = instance
            .network_interfaces
            .into_iter()
            .filter_map(|nic| nic.network_ip)
            .collect();

        Ok(Some(VmInfo {
            ips,
            labels: instance.labels,
            name: instance.name,
            project: project.to_string(),
        }))
    }
}
