use crate::{
    allowlist::AllowList,
    config::DnsDefaults,
    dns::{
        clouddns::CloudDnsApi,
        ipset,
        ptr,
        Change,
        RecordSet,
        RecordType,
    },
};
use eyre::Result;
use std::{
    collections::HashMap,
    fmt,
    sync::Arc,
};
use tokio::sync::Mutex;

/// What a single VM lifecycle event asks the engine to converge on. Every
/// placement field may be empty, in which case the configured default wins.
#[derive(Clone, Debug, Default)]
pub struct ReconcileRequest {
    /// Hostname label; falls back to the VM name when empty.
    pub host_name: String,
    pub zone: String,
    pub zone_host_project: String,
    pub domain: String,
    pub action: Action,
    /// Target address set. May be empty; an empty create is accepted and
    /// only warned about.
    pub ips: Vec<String>,
    pub vm_name: String,
    /// Required. Requests without an owning project are rejected as no-ops.
    pub vm_project: String,
    pub ptr_host_project: String,
    pub ptr_zone: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Action {
    #[default]
    Create,
    Delete,
}

/// Terminal state of one reconciliation pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Both records submitted as a fresh addition change.
    Created,
    /// An existing forward record had its value list replaced in place.
    Patched,
    /// Both records removed whole.
    Deleted,
    /// Nothing to do: missing identifiers, allow-list denial, or a delete
    /// for a record that does not exist.
    NoOp,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Created => "created",
            Outcome::Patched => "patched",
            Outcome::Deleted => "deleted",
            Outcome::NoOp => "noop",
        };
        f.write_str(s)
    }
}

/// Drives one request through: allow-list gate, existing-record query, value
/// set computation, and the provider mutations for the A/PTR pair.
///
/// The forward and reverse records are two independent provider resources
/// with no cross-resource transaction. Sub-step failures are logged and the
/// sibling operation is still attempted; a partially applied pair is an
/// accepted inconsistency window, not a retry.
pub struct Reconciler {
    dns: CloudDnsApi,
    allow_list: AllowList,
    defaults: DnsDefaults,
    /// Per-hostname locks, so rapid create/delete events for the same name
    /// cannot interleave their read-then-write cycles. Requests for
    /// different hostnames run concurrently.
    hostname_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Reconciler {
    pub fn new(dns: CloudDnsApi, allow_list: AllowList, defaults: DnsDefaults) -> Self {
        Reconciler {
            dns,
            allow_list,
            defaults,
            hostname_locks: Mutex::default(),
        }
    }

    pub async fn reconcile(&self, req: &ReconcileRequest) -> Result<Outcome> {
        let host_name = pick(&req.host_name, &req.vm_name);
        if host_name.is_empty() {
            info!("request has no hostname, nothing to do");
            return Ok(Outcome::NoOp);
        }
        if req.vm_project.is_empty() {
            info!(vm = %req.vm_name, "request has no VM project, nothing to do");
            return Ok(Outcome::NoOp);
        }

        let zone = pick(&req.zone, &self.defaults.dns_zone);
        let domain = pick(&req.domain, &self.defaults.dns_domain);
        let host_project = pick(&req.zone_host_project, &self.defaults.dns_host_project);
        let ptr_zone = pick(&req.ptr_zone, &self.defaults.ptr_zone);
        let ptr_project = pick(&req.ptr_host_project, &self.defaults.ptr_host_project);
        let ptr_domain = pick(&self.defaults.ptr_domain, ptr::DEFAULT_PTR_DOMAIN);

        let fqdn = format!("{host_name}.{domain}");

        if !self.allow_list.is_allowed(&fqdn, &req.vm_project) {
            info!(%fqdn, project = %req.vm_project, "hostname is not allow-listed, nothing to do");
            return Ok(Outcome::NoOp);
        }

        if req.ips.is_empty() {
            warn!(vm = %req.vm_name, %fqdn, "request carries no IPs");
        }

        // The PTR name derives from the primary interface address. With no
        // addresses there is no reverse record to manage.
        let ptr_record = match req.ips.first() {
            Some(ip) => Some(RecordSet::ptr(ptr::ptr_name(ip, &ptr_domain)?, &fqdn)),
            None => None,
        };
        let forward_record = RecordSet::a(&fqdn, req.ips.clone());

        let lock = self.hostname_lock(&fqdn).await;
        let _guard = lock.lock().await;

        let existing = self
            .dns
            .list_record_sets(&host_project, &zone, Some(&fqdn))
            .await?
            .into_iter()
            .find(|rs| rs.name == fqdn && rs.record_type == RecordType::A);

        match req.action {
            Action::Create => match existing {
                Some(existing) => {
                    debug!(%fqdn, previous = ?existing.rrdatas, incoming = ?req.ips, "record exists, patching");

                    // The reverse side goes in as a fresh addition either
                    // way; the forward value list is replaced in place.
                    if let Some(ptr_record) = ptr_record {
                        if let Err(err) = self
                            .dns
                            .submit_change(&ptr_project, &ptr_zone, &Change::addition(ptr_record))
                            .await
                        {
                            error!(%fqdn, "failed to create PTR record: {err:?}");
                        }
                    }

                    let merged = ipset::merge_for_create(&existing.rrdatas, &req.ips);
                    if let Err(err) = self
                        .dns
                        .patch_record_set(&host_project, &zone, &fqdn, RecordType::A, merged)
                        .await
                    {
                        error!(%fqdn, "failed to patch A record: {err:?}");
                    }

                    Ok(Outcome::Patched)
                }
                None => {
                    info!(%fqdn, ips = ?req.ips, "creating records");

                    if let Err(err) = self
                        .dns
                        .submit_change(&host_project, &zone, &Change::addition(forward_record))
                        .await
                    {
                        error!(%fqdn, "failed to create A record: {err:?}");
                    }
                    if let Some(ptr_record) = ptr_record {
                        if let Err(err) = self
                            .dns
                            .submit_change(&ptr_project, &ptr_zone, &Change::addition(ptr_record))
                            .await
                        {
                            error!(%fqdn, "failed to create PTR record: {err:?}");
                        }
                    }

                    Ok(Outcome::Created)
                }
            },
            Action::Delete => {
                let Some(existing) = existing else {
                    debug!(%fqdn, "no record to delete");
                    return Ok(Outcome::NoOp);
                };

                if ipset::sorted_eq(&existing.rrdatas, &req.ips) {
                    // The requested set matches the published set exactly,
                    // so both records go away whole.
                    info!(%fqdn, "deleting records");

                    if let Err(err) = self
                        .dns
                        .submit_change(&host_project, &zone, &Change::deletion(forward_record))
                        .await
                    {
                        error!(%fqdn, "failed to delete A record: {err:?}");
                    }
                    if let Some(ptr_record) = ptr_record {
                        if let Err(err) = self
                            .dns
                            .submit_change(&ptr_project, &ptr_zone, &Change::deletion(ptr_record))
                            .await
                        {
                            error!(%fqdn, "failed to delete PTR record: {err:?}");
                        }
                    }

                    Ok(Outcome::Deleted)
                } else {
                    debug!(%fqdn, previous = ?existing.rrdatas, removing = ?req.ips, "partial delete, patching");

                    if let Some(ptr_record) = ptr_record {
                        if let Err(err) = self
                            .dns
                            .submit_change(&ptr_project, &ptr_zone, &Change::deletion(ptr_record))
                            .await
                        {
                            error!(%fqdn, "failed to delete PTR record: {err:?}");
                        }
                    }

                    let remaining = ipset::subtract_for_delete(&existing.rrdatas, &req.ips);
                    if let Err(err) = self
                        .dns
                        .patch_record_set(&host_project, &zone, &fqdn, RecordType::A, remaining)
                        .await
                    {
                        error!(%fqdn, "failed to patch A record: {err:?}");
                    }

                    Ok(Outcome::Patched)
                }
            }
        }
    }

    async fn hostname_lock(&self, fqdn: &str) -> Arc<Mutex<()>> {
        self.hostname_locks
            .lock()
            .await
            .entry(fqdn.to_string())
            .or_default()
            .clone()
    }
}

fn pick(value: &str, default: &str) -> String {
    if value.is_empty() { default } else { value }.to_string()
}
