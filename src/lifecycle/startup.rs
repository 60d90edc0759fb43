//! Startup orchestration.
//!
//! # Responsibilities
//! - Wire a node from validated settings
//! - Start the configuration coordinator
//! - Mark initialization done on the owner
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The coordinator is started last; dependent subsystems read through it

use std::sync::Arc;

use crate::convergence::{ConfigCoordinator, CoordinatorDeps, CoordinatorError, SnapshotTarget};
use crate::datastore::ConfigDatastore;
use crate::lifecycle::Shutdown;
use crate::ownership::OwnershipService;
use crate::settings::NodeSettings;
use crate::snapshot::LocalSnapshotStore;

/// Snapshot location described by the settings.
pub fn snapshot_target(settings: &NodeSettings) -> SnapshotTarget {
    SnapshotTarget::new(
        LocalSnapshotStore::new(&settings.snapshot.directory),
        settings.snapshot.category.clone(),
        settings.snapshot.key.clone(),
    )
}

/// Start the coordinator for a node and publish the initialization marker.
pub async fn start_node(
    settings: &NodeSettings,
    datastore: Arc<dyn ConfigDatastore>,
    ownership: Arc<dyn OwnershipService>,
    shutdown: Shutdown,
) -> Result<ConfigCoordinator, CoordinatorError> {
    tracing::info!(
        node = %settings.node.name,
        snapshot_dir = %settings.snapshot.directory,
        "Starting configuration coordinator"
    );

    let coordinator = ConfigCoordinator::start(CoordinatorDeps {
        datastore,
        ownership,
        snapshot: snapshot_target(settings),
        shutdown,
    })
    .await?;

    let outcome = coordinator.init_done().await?;
    tracing::info!(
        node = %settings.node.name,
        init_done = outcome.label(),
        topology_wait = coordinator.topology_wait(),
        flow_mod_timeout = coordinator.flow_mod_timeout(),
        controller_mac = %coordinator.controller_mac_address(),
        "Node configuration ready"
    );
    Ok(coordinator)
}
