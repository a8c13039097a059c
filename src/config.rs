//! Batch run configuration.
//!
//! Loaded from a YAML file, from environment variables, or left at the
//! defaults. Both switches default to on.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Partially evaluate policies at every expansion level
    pub prune: bool,
    /// Expand variables with fewer candidates first
    pub sort_variables: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            prune: true,
            sort_variables: true,
        }
    }
}

impl BatchConfig {
    pub fn from_env() -> Self {
        Self {
            prune: env_bool("AUTHZ_BATCH_PRUNE", true),
            sort_variables: env_bool("AUTHZ_BATCH_SORT_VARIABLES", true),
        }
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            path = %path.display(),
            prune = config.prune,
            sort_variables = config.sort_variables,
            "Loaded batch config"
        );
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => parse_bool(&v),
        Err(_) => default,
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_everything() {
        let config = BatchConfig::default();
        assert!(config.prune);
        assert!(config.sort_variables);
    }

    #[test]
    fn yaml_fills_missing_fields_with_defaults() {
        let config = BatchConfig::from_yaml_str("prune: false\n").unwrap();
        assert_eq!(
            config,
            BatchConfig {
                prune: false,
                sort_variables: true
            }
        );
    }

    #[test]
    fn yaml_rejects_wrong_types() {
        assert!(BatchConfig::from_yaml_str("prune: [1, 2]\n").is_err());
    }

    #[test]
    fn truthy_env_values() {
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("1"));
        assert!(parse_bool("yes"));
        assert!(!parse_bool("off"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = BatchConfig::from_yaml_file("/nonexistent/authz-batch.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
