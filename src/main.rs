#[macro_use]
extern crate tracing;

use clap::Parser;
use eyre::Result;
use gce_dns_sync::{
    allowlist::AllowList,
    config::Settings,
    dns::clouddns::CloudDnsApi,
    events::{
        self,
        EventHandler,
    },
    inventory::ComputeApi,
    reconcile::Reconciler,
};
use std::path::PathBuf;
use tokio::io::{
    AsyncBufReadExt as _,
    BufReader,
};

#[derive(Parser)]
#[command(version, about)]
enum Args {
    /// Read Pub/Sub event envelopes from stdin, one JSON document per line,
    /// and reconcile DNS records for each.
    Run(Settings),

    /// Process a single event payload from a file and exit.
    Event {
        #[clap(flatten)]
        settings: Settings,

        /// Path to a Pub/Sub envelope or bare audit-log entry
        path: PathBuf,
    },

    /// List record sets in a zone.
    ListRecords {
        #[clap(flatten)]
        settings: Settings,

        #[clap(long, help = "Zone host project; defaults to the configured DNS host project")]
        project: Option<String>,

        #[clap(long, help = "Zone name; defaults to the configured DNS zone")]
        zone: Option<String>,

        #[clap(long, help = "Only list record sets with this exact name")]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install().expect("color_eyre init");
    tracing_subscriber::fmt::init();

    match Args::parse() {
        Args::Run(settings) => run(settings).await?,
        Args::Event { settings, path } => {
            let handler = build_handler(&settings)?;
            let raw = tokio::fs::read_to_string(&path).await?;
            let data = events::decode_envelope(&raw)?;
            let result = handler.handle(&data).await?;
            println!("{result}");
        }
        Args::ListRecords {
            settings,
            project,
            zone,
            name,
        } => {
            let dns = CloudDnsApi::new(&settings.dns_endpoint, &settings.access_token);
            let project = project.unwrap_or_else(|| settings.defaults.dns_host_project.clone());
            let zone = zone.unwrap_or_else(|| settings.defaults.dns_zone.clone());
            let records = dns.list_record_sets(&project, &zone, name.as_deref()).await?;
            dbg!(records);
        }
    }

    Ok(())
}

/// Wires the allow list, provider clients, and reconciler together. Fails
/// before any event is consumed when the allow list is missing or malformed;
/// policy must be available before any mutation is attempted.
fn build_handler(settings: &Settings) -> Result<EventHandler> {
    let allow_list = AllowList::load(&settings.allow_list)?;
    let dns = CloudDnsApi::new(&settings.dns_endpoint, &settings.access_token);
    let compute = ComputeApi::new(&settings.compute_endpoint, &settings.access_token);
    let reconciler = Reconciler::new(dns, allow_list, settings.defaults.clone());

    Ok(EventHandler {
        compute,
        reconciler,
        metadata_settle: settings.metadata_settle,
    })
}

async fn run(settings: Settings) -> Result<()> {
    let handler = build_handler(&settings)?;

    info!("Listening for VM lifecycle events on stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let data = match events::decode_envelope(line.trim()) {
            Ok(data) => data,
            Err(err) => {
                error!("failed to decode event envelope: {err:?}");
                continue;
            }
        };

        // A failed event must not stop the processor; log and move on.
        match handler.handle(&data).await {
            Ok(result) => info!("{result}"),
            Err(err) => error!("failed to process event: {err:?}"),
        }
    }

    info!("Event stream closed");

    Ok(())
}
