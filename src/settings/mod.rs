//! Node settings subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → NodeSettings (validated, immutable)
//!     → lifecycle/startup.rs wires the node from it
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal files
//! - Validation separates syntactic (serde) from semantic checks
//! - Cluster-wide tunables are not settings: they come from the datastore

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_settings, parse_settings, SettingsError};
pub use schema::{NodeConfig, NodeSettings, ObservabilityConfig, OwnershipConfig, SnapshotConfig};
pub use validation::{validate_settings, ValidationError};
