use super::{
    Change,
    RecordSet,
    RecordType,
};
use eyre::{
    bail,
    Result,
};
use reqwest::Method;
use serde::{
    de::DeserializeOwned,
    Deserialize,
    Serialize,
};
use serde_json::Value;

pub const DEFAULT_ENDPOINT: &str = "https://dns.googleapis.com";

/// Client for the Cloud DNS v1 REST surface.
///
/// See https://cloud.google.com/dns/docs/reference/rest/v1/changes/create
/// for the change semantics: a change atomically adds and removes whole
/// record sets within one zone, nothing finer-grained.
#[derive(Clone)]
pub struct CloudDnsApi {
    client: reqwest::Client,
    endpoint: String,
    access_token: String,
}

/// Wraps the rrsets list response.
#[derive(Debug, Deserialize)]
struct RecordSetList {
    #[serde(default)]
    rrsets: Vec<RecordSet>,
}

/// Body of the rrset PATCH call, replacing only the value list.
#[derive(Debug, Serialize)]
struct PatchBody {
    rrdatas: Vec<String>,
}

impl CloudDnsApi {
    pub fn new(endpoint: impl ToString, access_token: impl ToString) -> Self {
        CloudDnsApi {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            access_token: access_token.to_string(),
        }
    }

    /// List record sets in a zone, optionally filtered to an exact name.
    pub async fn list_record_sets(&self, project: &str, zone: &str, name: Option<&str>) -> Result<Vec<RecordSet>> {
        let mut url = format!(
            "{}/dns/v1/projects/{project}/managedZones/{zone}/rrsets",
            self.endpoint
        );
        if let Some(name) = name {
            url.push_str(&format!("?name={name}"));
        }

        let list: RecordSetList = self.request(&url, Method::GET, None::<()>).await?;
        Ok(list.rrsets)
    }

    /// Submit one atomic change to a zone.
    pub async fn submit_change(&self, project: &str, zone: &str, change: &Change) -> Result<()> {
        debug!(
            additions = change.additions.len(),
            deletions = change.deletions.len(),
            %zone,
            "submitting dns change"
        );

        let url = format!(
            "{}/dns/v1/projects/{project}/managedZones/{zone}/changes",
            self.endpoint
        );
        let _: Value = self.request(&url, Method::POST, Some(change)).await?;
        Ok(())
    }

    /// Replace the value list of an existing record set in place.
    ///
    /// The change API can only add or remove whole record sets, so updating
    /// the values of a published record goes through this direct PATCH. Hot
    /// path for every VM whose hostname already has a record.
    pub async fn patch_record_set(
        &self,
        project: &str,
        zone: &str,
        name: &str,
        record_type: RecordType,
        rrdatas: Vec<String>,
    ) -> Result<()> {
        debug!(%name, %record_type, ?rrdatas, "patching record set");

        let url = format!(
            "{}/dns/v1/projects/{project}/managedZones/{zone}/rrsets/{name}/{record_type}",
            self.endpoint
        );
        let _: Value = self.request(&url, Method::PATCH, Some(PatchBody { rrdatas })).await?;
        Ok(())
    }

    async fn request<R, B>(&self, url: &str, method: Method, body: Option<B>) -> Result<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let req = self
            .client
            .request(method, url)
            .bearer_auth(&self.access_token)
            .header("Content-Type", "application/json");

        let req = if let Some(body) = body { req.json(&body) } else { req };

        let res = req.send().await?;

        if !res.status().is_success() {
            bail!(
                "cloud dns api error: status={:?}, body={:?}",
                res.status(),
                res.text().await?
            );
        }

        Ok(res.json().await?)
    }
}
