//! Node settings schema.
//!
//! These are process-level settings of one node, read from a local TOML
//! file. The cluster-wide configuration itself lives in the datastore.

use serde::{Deserialize, Serialize};

/// Root settings for a node.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct NodeSettings {
    /// Node identity.
    pub node: NodeConfig,

    /// Local snapshot cache location.
    pub snapshot: SnapshotConfig,

    /// Ownership used when running standalone.
    pub ownership: OwnershipConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Node identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Name used in logs.
    pub name: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "node-1".to_string(),
        }
    }
}

/// Where the local configuration snapshot is kept.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Root directory of the snapshot store.
    pub directory: String,

    /// Snapshot category (subdirectory).
    pub category: String,

    /// Snapshot key (file name without extension).
    pub key: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            directory: "./state".to_string(),
            category: "cluster".to_string(),
            key: "config".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OwnershipConfig {
    /// Whether a standalone node owns the configuration resource.
    pub standalone_owner: bool,
}

impl Default for OwnershipConfig {
    fn default() -> Self {
        Self {
            standalone_owner: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
