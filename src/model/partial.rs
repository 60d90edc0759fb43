//! Desired-scope configuration entry.
//!
//! Administrators author a `PartialConfig`: every field is optional and
//! unset fields fall back to their defaults when merged.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::mac::MacAddress;

/// Inclusive valid range and default of a numeric field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRange {
    pub name: &'static str,
    pub min: u32,
    pub max: u32,
    pub default: u32,
}

impl FieldRange {
    pub fn contains(&self, value: u32) -> bool {
        (self.min..=self.max).contains(&value)
    }

    fn check(&self, value: Option<u32>) -> Result<(), FieldError> {
        match value {
            Some(v) if !self.contains(v) => Err(FieldError::OutOfRange {
                field: self.name,
                value: v,
                min: self.min,
                max: self.max,
            }),
            _ => Ok(()),
        }
    }
}

pub const TOPOLOGY_WAIT: FieldRange = FieldRange {
    name: "topology-wait",
    min: 0,
    max: 600_000,
    default: 3000,
};

pub const L2_FLOW_PRIORITY: FieldRange = FieldRange {
    name: "l2-flow-priority",
    min: 1,
    max: 999,
    default: 10,
};

pub const FLOW_MOD_TIMEOUT: FieldRange = FieldRange {
    name: "flow-mod-timeout",
    min: 100,
    max: 60_000,
    default: 3000,
};

pub const BULK_FLOW_MOD_TIMEOUT: FieldRange = FieldRange {
    name: "bulk-flow-mod-timeout",
    min: 3000,
    max: 600_000,
    default: 10_000,
};

pub const INIT_TIMEOUT: FieldRange = FieldRange {
    name: "init-timeout",
    min: 100,
    max: 600_000,
    default: 10_000,
};

pub const MAX_REDIRECTIONS: FieldRange = FieldRange {
    name: "max-redirections",
    min: 10,
    max: 100_000,
    default: 100,
};

pub const CONTROLLER_MAC_ADDRESS: &str = "controller-mac-address";
pub const HOST_TRACKING: &str = "host-tracking";
pub const DEFAULT_HOST_TRACKING: bool = true;

/// A single field validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("{field}={value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

/// All validation failures of one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialConfigError(pub Vec<FieldError>);

impl fmt::Display for PartialConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid configuration: ")?;
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for PartialConfigError {}

/// Partial configuration as written to the desired scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PartialConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topology_wait: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub l2_flow_priority: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_mod_timeout: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bulk_flow_mod_timeout: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_timeout: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_redirections: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller_mac_address: Option<MacAddress>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_tracking: Option<bool>,
}

impl PartialConfig {
    /// True if no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Check every present numeric field against its range.
    ///
    /// Returns all violations, not just the first.
    pub fn validate(&self) -> Result<(), PartialConfigError> {
        let errors: Vec<FieldError> = [
            TOPOLOGY_WAIT.check(self.topology_wait),
            L2_FLOW_PRIORITY.check(self.l2_flow_priority),
            FLOW_MOD_TIMEOUT.check(self.flow_mod_timeout),
            BULK_FLOW_MOD_TIMEOUT.check(self.bulk_flow_mod_timeout),
            INIT_TIMEOUT.check(self.init_timeout),
            MAX_REDIRECTIONS.check(self.max_redirections),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PartialConfigError(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_entry_is_valid() {
        let partial = PartialConfig::default();
        assert!(partial.is_empty());
        assert!(partial.validate().is_ok());
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let partial = PartialConfig {
            topology_wait: Some(0),
            l2_flow_priority: Some(999),
            flow_mod_timeout: Some(100),
            bulk_flow_mod_timeout: Some(600_000),
            init_timeout: Some(100),
            max_redirections: Some(100_000),
            ..Default::default()
        };
        assert!(partial.validate().is_ok());
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let partial = PartialConfig {
            l2_flow_priority: Some(0),
            flow_mod_timeout: Some(99),
            max_redirections: Some(100_001),
            ..Default::default()
        };
        let err = partial.validate().unwrap_err();
        assert_eq!(err.0.len(), 3);
        assert_eq!(
            err.0[0],
            FieldError::OutOfRange {
                field: "l2-flow-priority",
                value: 0,
                min: 1,
                max: 999
            }
        );
        assert!(err.to_string().contains("flow-mod-timeout=99"));
    }

    #[test]
    fn test_serde_uses_kebab_case_and_skips_unset() {
        let partial = PartialConfig {
            flow_mod_timeout: Some(4000),
            host_tracking: Some(false),
            ..Default::default()
        };
        let json = serde_json::to_value(&partial).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "flow-mod-timeout": 4000, "host-tracking": false })
        );

        let parsed: PartialConfig = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, partial);
    }
}
