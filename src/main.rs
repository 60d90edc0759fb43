//! Cluster configuration node (v1)
//!
//! Runs one node of the configuration convergence subsystem.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────── datastore ────────────────────────┐
//!   │   desired scope                     operational scope     │
//!   └──────┬──────────────────────────────────▲──────────┬──────┘
//!          │ change events                    │ commit   │ change events
//!          ▼                                  │          ▼
//!   ┌──────────────┐   ┌─────────────┐   ┌────┴─────┐  ┌───────────────┐
//!   │   desired    │──▶│ write queue │──▶│  tasks   │  │  operational  │
//!   │   watcher    │   │ (1 worker)  │   │(owner    │  │   watcher     │
//!   └──────────────┘   └─────────────┘   │ only)    │  └───────┬───────┘
//!                                        └────┬─────┘          │ swap
//!                                             ▼                ▼
//!                                     local snapshot     ConfigCell ──▶ accessors
//! ```
//!
//! Standalone mode: the datastore is in-process and ownership comes from
//! the settings file.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use cluster_config::datastore::InMemoryDatastore;
use cluster_config::lifecycle::{signals, startup, Shutdown};
use cluster_config::observability::{logging, metrics};
use cluster_config::ownership::{StaticOwnership, CONFIG_RESOURCE};
use cluster_config::settings::{load_settings, NodeSettings};

#[derive(Parser)]
#[command(name = "cluster-config")]
#[command(about = "Cluster configuration convergence node", long_about = None)]
struct Args {
    /// Path to the node settings file (TOML).
    #[arg(short, long, default_value = "cluster-config.toml")]
    settings: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let (settings, from_file) = if args.settings.exists() {
        (load_settings(&args.settings)?, true)
    } else {
        (NodeSettings::default(), false)
    };

    logging::init_logging(&settings.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "cluster-config starting");
    if !from_file {
        tracing::warn!(path = %args.settings.display(), "Settings file not found, using defaults");
    }

    if settings.observability.metrics_enabled {
        match settings.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let datastore = Arc::new(InMemoryDatastore::new());
    let ownership = Arc::new(StaticOwnership::new());
    ownership.set_owner(CONFIG_RESOURCE, settings.ownership.standalone_owner);

    let coordinator =
        startup::start_node(&settings, datastore, ownership, shutdown.clone()).await?;

    shutdown.triggered().await;
    coordinator.close();

    tracing::info!("Shutdown complete");
    Ok(())
}
