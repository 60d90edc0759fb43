//! Cluster-wide configuration convergence library.
//!
//! Every node in the cluster converges on one effective configuration
//! record. The owner node writes it, every node observes it, and the last
//! known value is cached locally so a restart starts from it.

pub mod convergence;
pub mod datastore;
pub mod lifecycle;
pub mod model;
pub mod observability;
pub mod ownership;
pub mod settings;
pub mod snapshot;

pub use convergence::{ConfigCoordinator, CoordinatorDeps, CoordinatorError};
pub use lifecycle::Shutdown;
pub use model::{EffectiveConfig, MacAddress, PartialConfig};
pub use settings::NodeSettings;
