//! Settings validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check names and addresses are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: NodeSettings → Result<(), Vec<ValidationError>>

use std::fmt;
use std::net::SocketAddr;

use crate::settings::schema::NodeSettings;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem with the settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn error(field: &'static str, message: impl Into<String>) -> ValidationError {
    ValidationError {
        field,
        message: message.into(),
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// Validate node settings.
pub fn validate_settings(settings: &NodeSettings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if settings.node.name.trim().is_empty() {
        errors.push(error("node.name", "must not be empty"));
    }

    if settings.snapshot.directory.trim().is_empty() {
        errors.push(error("snapshot.directory", "must not be empty"));
    }
    if !is_plain_name(&settings.snapshot.category) {
        errors.push(error("snapshot.category", "must be a plain file name"));
    }
    if !is_plain_name(&settings.snapshot.key) {
        errors.push(error("snapshot.key", "must be a plain file name"));
    }

    let level = settings.observability.log_level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(error(
            "observability.log_level",
            format!("unknown level {:?}", settings.observability.log_level),
        ));
    }
    if settings.observability.metrics_enabled
        && settings.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(error(
            "observability.metrics_address",
            format!("invalid address {:?}", settings.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
