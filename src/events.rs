//! Audit-log event intake: decoding the Pub/Sub envelope, extracting the
//! authorization verdict and acted-upon VM, and turning both into a
//! [`ReconcileRequest`] via the inventory lookup.

use crate::{
    inventory::ComputeApi,
    reconcile::{
        Action,
        Outcome,
        ReconcileRequest,
        Reconciler,
    },
};
use base64::prelude::*;
use chrono::prelude::*;
use eyre::Result;
use serde::Deserialize;
use std::time::Duration;

const CREATE_PERMISSION: &str = "compute.instances.create";
const DELETE_PERMISSION: &str = "compute.instances.delete";
const GROUP_ADD_REQUEST: &str = "type.googleapis.com/compute.instanceGroups.addInstances";
const GROUP_REMOVE_REQUEST: &str = "type.googleapis.com/compute.instanceGroups.removeInstances";

/// VM label that opts an instance out of record management entirely.
const SKIP_LABEL: &str = "dns_skip_record";

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("event carried no data")]
    EmptyPayload,
    #[error("malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("no VM info received for {0:?}")]
    NoVmInfo(String),
}

/// A Pub/Sub message as delivered to the event processor; `data` holds the
/// base64-encoded audit-log entry.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PubSubMessage {
    pub data: String,
}

/// The slice of the gce_instance audit-log schema this service acts on.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogEntry {
    pub insert_id: String,
    pub log_name: String,
    pub proto_payload: ProtoPayload,
    pub resource: MonitoredResource,
    pub severity: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub receive_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProtoPayload {
    pub authorization_info: Vec<AuthorizationInfo>,
    pub method_name: String,
    pub request: RequestInfo,
    pub resource_name: String,
    pub service_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthorizationInfo {
    pub granted: bool,
    pub permission: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RequestInfo {
    #[serde(rename = "@type")]
    pub request_type: String,
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MonitoredResource {
    pub labels: ResourceLabels,
    #[serde(rename = "type")]
    pub resource_type: String,
}

/// Identifies the acted-upon VM; all three fields are required for the
/// inventory lookup.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResourceLabels {
    pub instance_id: String,
    pub project_id: String,
    pub zone: String,
}

impl LogEntry {
    /// The lifecycle action this entry represents, if any. Only granted
    /// create/delete verdicts count; instance-group membership changes carry
    /// no per-instance permission and match on the request type instead.
    pub fn action(&self) -> Option<Action> {
        let request_type = &self.proto_payload.request.request_type;
        for auth in &self.proto_payload.authorization_info {
            if (auth.granted && auth.permission == CREATE_PERMISSION) || request_type == GROUP_ADD_REQUEST {
                return Some(Action::Create);
            }
            if (auth.granted && auth.permission == DELETE_PERMISSION) || request_type == GROUP_REMOVE_REQUEST {
                return Some(Action::Delete);
            }
        }
        None
    }
}

/// Unwrap a Pub/Sub envelope into the raw audit-log payload. Input without
/// an envelope is passed through as a bare payload.
pub fn decode_envelope(raw: &str) -> Result<Vec<u8>> {
    if let Ok(msg) = serde_json::from_str::<PubSubMessage>(raw) {
        if !msg.data.is_empty() {
            return Ok(BASE64_STANDARD.decode(&msg.data)?);
        }
    }
    Ok(raw.as_bytes().to_vec())
}

/// Per-event pipeline: parse the audit entry, resolve the VM through the
/// inventory, and hand the reconciler a request shaped by the VM's labels.
pub struct EventHandler {
    pub compute: ComputeApi,
    pub reconciler: Reconciler,
    pub metadata_settle: Option<Duration>,
}

impl EventHandler {
    /// Process one audit-log payload, returning a human-readable result.
    /// Policy denials and missing VMs are reported, not raised; only
    /// malformed input and provider failures come back as errors.
    pub async fn handle(&self, data: &[u8]) -> Result<String> {
        if data.is_empty() {
            return Err(EventError::EmptyPayload.into());
        }

        let entry: LogEntry = serde_json::from_slice(data).map_err(EventError::Malformed)?;
        let resource_name = entry.proto_payload.resource_name.clone();

        let labels = &entry.resource.labels;
        if labels.project_id.is_empty() || labels.zone.is_empty() || labels.instance_id.is_empty() {
            return Err(EventError::NoVmInfo(resource_name).into());
        }

        let Some(action) = entry.action() else {
            return Ok(format!("no create/delete operation in event for {resource_name:?}"));
        };

        if let Some(settle) = self.metadata_settle {
            // NIC assignment can lag the audit event.
            tokio::time::sleep(settle).await;
        }

        let Some(vm) = self
            .compute
            .instance(&labels.project_id, &labels.zone, &labels.instance_id)
            .await?
        else {
            return Err(EventError::NoVmInfo(resource_name).into());
        };

        debug!(name = %vm.name, ips = ?vm.ips, labels = ?vm.labels, "resolved VM");

        if vm.ips.is_empty() {
            return Ok(format!("received no VM IPs for {resource_name:?}"));
        }
        if vm.labels.get(SKIP_LABEL).is_some_and(|v| !v.is_empty()) {
            return Ok(format!("{SKIP_LABEL} is set for {resource_name:?}"));
        }

        let label = |key: &str| vm.labels.get(key).cloned().unwrap_or_default();
        let request = ReconcileRequest {
            host_name: label("dns_host_name"),
            zone: label("dns_zone_name"),
            zone_host_project: label("dns_zone_host_project"),
            domain: label("dns_domain"),
            action,
            ips: vm.ips.clone(),
            vm_name: vm.name.clone(),
            vm_project: vm.project.clone(),
            ptr_host_project: String::new(),
            ptr_zone: String::new(),
        };

        let record_name = if request.host_name.is_empty() {
            request.vm_name.clone()
        } else {
            request.host_name.clone()
        };

        let outcome = self.reconciler.reconcile(&request).await?;

        Ok(match (action, outcome) {
            (Action::Create, Outcome::NoOp) => {
                format!("{resource_name}'s DNS record {record_name:?} was not created")
            }
            (Action::Create, _) => {
                format!(
                    "{resource_name}'s DNS record {record_name:?} now covers IPs {:?} ({outcome})",
                    vm.ips
                )
            }
            (Action::Delete, Outcome::NoOp) => {
                format!("{resource_name}'s DNS record {record_name:?} was not deleted")
            }
            (Action::Delete, _) => {
                format!(
                    "{resource_name}'s DNS record {record_name:?} dropped IPs {:?} ({outcome})",
                    vm.ips
                )
            }
        })
    }
}
