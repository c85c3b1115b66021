use crate::{
    dns::{
        clouddns,
        ptr,
    },
    inventory,
};
use clap::Args;
use std::{
    path::PathBuf,
    time::Duration,
};

/// Process-wide settings, built once at startup. Nothing here is read from
/// the environment after argument parsing.
#[derive(Args, Clone, Debug)]
pub struct Settings {
    #[clap(
        long,
        env = "GCP_ACCESS_TOKEN",
        hide_env_values = true,
        help = "OAuth2 access token used for Cloud DNS and Compute API calls"
    )]
    pub access_token: String,

    #[clap(
        long,
        env = "DNS_ALLOW_LIST",
        default_value = "dns_allow_list.yaml",
        help = "Path to the YAML file mapping VM projects to allowed hostname patterns"
    )]
    pub allow_list: PathBuf,

    #[clap(
        long,
        env = "VM_METADATA_SETTLE",
        value_parser = humantime::parse_duration,
        help = "How long to wait before the inventory lookup; NIC assignment can lag the event"
    )]
    pub metadata_settle: Option<Duration>,

    #[clap(long, env = "DNS_API_ENDPOINT", default_value = clouddns::DEFAULT_ENDPOINT, hide = true)]
    pub dns_endpoint: String,

    #[clap(long, env = "COMPUTE_API_ENDPOINT", default_value = inventory::DEFAULT_ENDPOINT, hide = true)]
    pub compute_endpoint: String,

    #[clap(flatten)]
    pub defaults: DnsDefaults,
}

/// Default record placement. Every field can be overridden per request by
/// the VM's labels; an empty override falls back to the value here.
#[derive(Args, Clone, Debug, Default)]
pub struct DnsDefaults {
    #[clap(
        long,
        env = "DEFAULT_DNS_HOST_PROJECT",
        default_value = "",
        help = "Project hosting the forward zone"
    )]
    pub dns_host_project: String,

    #[clap(long, env = "DEFAULT_DNS_ZONE", default_value = "", help = "Forward zone name")]
    pub dns_zone: String,

    #[clap(
        long,
        env = "DEFAULT_DNS_DOMAIN",
        default_value = "",
        help = "Domain suffix appended to hostnames, with trailing dot"
    )]
    pub dns_domain: String,

    #[clap(
        long,
        env = "DEFAULT_PTR_DOMAIN",
        default_value = ptr::DEFAULT_PTR_DOMAIN,
        help = "Reverse-lookup domain suffix"
    )]
    pub ptr_domain: String,

    #[clap(long, env = "DEFAULT_PTR_ZONE", default_value = "", help = "Reverse zone name")]
    pub ptr_zone: String,

    #[clap(
        long,
        env = "DEFAULT_PTR_HOST_PROJECT",
        default_value = "",
        help = "Project hosting the reverse zone"
    )]
    pub ptr_host_project: String,
}
