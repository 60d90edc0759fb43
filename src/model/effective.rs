//! Fully-resolved configuration snapshot and its merge/diff logic.

use std::fmt::{Display, Write};

use serde::{Deserialize, Serialize};

use crate::model::mac::MacAddress;
use crate::model::partial::{
    PartialConfig, PartialConfigError, BULK_FLOW_MOD_TIMEOUT, CONTROLLER_MAC_ADDRESS,
    DEFAULT_HOST_TRACKING, FLOW_MOD_TIMEOUT, HOST_TRACKING, INIT_TIMEOUT, L2_FLOW_PRIORITY,
    MAX_REDIRECTIONS, TOPOLOGY_WAIT,
};

/// The authoritative configuration.
///
/// Immutable once built: convergence replaces the shared reference to a
/// snapshot rather than editing one. Fields can only be set through
/// [`EffectiveConfig::fill_default`] or deserialization, both of which keep
/// every numeric field inside its declared range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PartialConfig", into = "PartialConfig")]
pub struct EffectiveConfig {
    topology_wait: u32,
    l2_flow_priority: u32,
    flow_mod_timeout: u32,
    bulk_flow_mod_timeout: u32,
    init_timeout: u32,
    max_redirections: u32,
    controller_mac_address: MacAddress,
    host_tracking: bool,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self::fill_default(&PartialConfig::default())
    }
}

impl EffectiveConfig {
    /// Resolve a partial entry: set fields win, unset fields take defaults.
    ///
    /// Range checks happen upstream in [`PartialConfig::validate`].
    pub fn fill_default(partial: &PartialConfig) -> Self {
        Self {
            topology_wait: partial.topology_wait.unwrap_or(TOPOLOGY_WAIT.default),
            l2_flow_priority: partial.l2_flow_priority.unwrap_or(L2_FLOW_PRIORITY.default),
            flow_mod_timeout: partial.flow_mod_timeout.unwrap_or(FLOW_MOD_TIMEOUT.default),
            bulk_flow_mod_timeout: partial
                .bulk_flow_mod_timeout
                .unwrap_or(BULK_FLOW_MOD_TIMEOUT.default),
            init_timeout: partial.init_timeout.unwrap_or(INIT_TIMEOUT.default),
            max_redirections: partial.max_redirections.unwrap_or(MAX_REDIRECTIONS.default),
            controller_mac_address: partial
                .controller_mac_address
                .unwrap_or_else(MacAddress::local_or_fallback),
            host_tracking: partial.host_tracking.unwrap_or(DEFAULT_HOST_TRACKING),
        }
    }

    /// True iff at least one field differs from `other`.
    pub fn is_updated(&self, other: &EffectiveConfig) -> bool {
        self != other
    }

    /// Describe the fields that changed from `self` to `new`.
    ///
    /// Returns `None` when nothing changed, otherwise `field=(old->new)`
    /// entries joined by `", "` in declaration order. For logging only.
    pub fn diff(&self, new: &EffectiveConfig) -> Option<String> {
        let mut out = String::new();
        push_diff(&mut out, TOPOLOGY_WAIT.name, self.topology_wait, new.topology_wait);
        push_diff(
            &mut out,
            L2_FLOW_PRIORITY.name,
            self.l2_flow_priority,
            new.l2_flow_priority,
        );
        push_diff(
            &mut out,
            FLOW_MOD_TIMEOUT.name,
            self.flow_mod_timeout,
            new.flow_mod_timeout,
        );
        push_diff(
            &mut out,
            BULK_FLOW_MOD_TIMEOUT.name,
            self.bulk_flow_mod_timeout,
            new.bulk_flow_mod_timeout,
        );
        push_diff(&mut out, INIT_TIMEOUT.name, self.init_timeout, new.init_timeout);
        push_diff(
            &mut out,
            MAX_REDIRECTIONS.name,
            self.max_redirections,
            new.max_redirections,
        );
        push_diff(
            &mut out,
            CONTROLLER_MAC_ADDRESS,
            self.controller_mac_address,
            new.controller_mac_address,
        );
        push_diff(&mut out, HOST_TRACKING, self.host_tracking, new.host_tracking);

        (!out.is_empty()).then_some(out)
    }

    pub fn topology_wait(&self) -> u32 {
        self.topology_wait
    }

    pub fn l2_flow_priority(&self) -> u32 {
        self.l2_flow_priority
    }

    pub fn flow_mod_timeout(&self) -> u32 {
        self.flow_mod_timeout
    }

    pub fn bulk_flow_mod_timeout(&self) -> u32 {
        self.bulk_flow_mod_timeout
    }

    pub fn init_timeout(&self) -> u32 {
        self.init_timeout
    }

    pub fn max_redirections(&self) -> u32 {
        self.max_redirections
    }

    pub fn controller_mac_address(&self) -> MacAddress {
        self.controller_mac_address
    }

    pub fn host_tracking(&self) -> bool {
        self.host_tracking
    }
}

fn push_diff<T: PartialEq + Display>(out: &mut String, name: &str, old: T, new: T) {
    if old == new {
        return;
    }
    if !out.is_empty() {
        out.push_str(", ");
    }
    // Writing into a String cannot fail.
    let _ = write!(out, "{}=({}->{})", name, old, new);
}

impl TryFrom<PartialConfig> for EffectiveConfig {
    type Error = PartialConfigError;

    fn try_from(partial: PartialConfig) -> Result<Self, Self::Error> {
        partial.validate()?;
        Ok(Self::fill_default(&partial))
    }
}

impl From<EffectiveConfig> for PartialConfig {
    fn from(config: EffectiveConfig) -> Self {
        Self {
            topology_wait: Some(config.topology_wait),
            l2_flow_priority: Some(config.l2_flow_priority),
            flow_mod_timeout: Some(config.flow_mod_timeout),
            bulk_flow_mod_timeout: Some(config.bulk_flow_mod_timeout),
            init_timeout: Some(config.init_timeout),
            max_redirections: Some(config.max_redirections),
            controller_mac_address: Some(config.controller_mac_address),
            host_tracking: Some(config.host_tracking),
        }
    }
}

/// The entry stored in the operational scope.
///
/// `init_done` is set by the owner once bootstrap has completed; it takes
/// no part in configuration equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OperationalEntry {
    pub config: EffectiveConfig,
    #[serde(default)]
    pub init_done: bool,
}

impl OperationalEntry {
    pub fn new(config: EffectiveConfig) -> Self {
        Self {
            config,
            init_done: false,
        }
    }

    pub fn with_init_done(mut self, init_done: bool) -> Self {
        self.init_done = init_done;
        self
    }
}
