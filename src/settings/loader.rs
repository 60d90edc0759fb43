//! Settings loading from disk.

use std::fs;
use std::path::Path;

use crate::settings::schema::NodeSettings;
use crate::settings::validation::{validate_settings, ValidationError};

/// Error type for settings loading.
#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "IO error: {}", e),
            SettingsError::Parse(e) => write!(f, "Parse error: {}", e),
            SettingsError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SettingsError::Io(e) => Some(e),
            SettingsError::Parse(e) => Some(e),
            SettingsError::Validation(_) => None,
        }
    }
}

/// Parse and validate settings from TOML text.
pub fn parse_settings(content: &str) -> Result<NodeSettings, SettingsError> {
    let settings: NodeSettings = toml::from_str(content).map_err(SettingsError::Parse)?;
    validate_settings(&settings).map_err(SettingsError::Validation)?;
    Ok(settings)
}

/// Load and validate settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<NodeSettings, SettingsError> {
    let content = fs::read_to_string(path).map_err(SettingsError::Io)?;
    parse_settings(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_file_uses_defaults() {
        let settings = parse_settings("[node]\nname = \"node-7\"\n").unwrap();
        assert_eq!(settings.node.name, "node-7");
        assert_eq!(settings.snapshot.category, "cluster");
        assert!(settings.ownership.standalone_owner);
    }

    #[test]
    fn test_full_file() {
        let content = r#"
            [node]
            name = "edge-2"

            [snapshot]
            directory = "/var/lib/cluster-config"
            category = "vtn"
            key = "global"

            [ownership]
            standalone_owner = false

            [observability]
            log_level = "debug"
            json_logs = true
            metrics_enabled = true
            metrics_address = "0.0.0.0:9100"
        "#;
        let settings = parse_settings(content).unwrap();
        assert_eq!(settings.snapshot.directory, "/var/lib/cluster-config");
        assert_eq!(settings.snapshot.key, "global");
        assert!(!settings.ownership.standalone_owner);
        assert!(settings.observability.json_logs);
    }

    #[test]
    fn test_parse_and_validation_errors() {
        assert!(matches!(
            parse_settings("[node\nname ="),
            Err(SettingsError::Parse(_))
        ));

        let err = parse_settings("[snapshot]\nkey = \"\"\n").unwrap_err();
        assert!(err.to_string().starts_with("Validation failed: snapshot.key"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_settings(Path::new("/nonexistent/node.toml")).unwrap_err();
        assert!(matches!(err, SettingsError::Io(_)));
    }
}
