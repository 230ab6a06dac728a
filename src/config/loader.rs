//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;
use crate::config::schema::FnServeConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<FnServeConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: FnServeConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fnserve.toml");
        fs::write(&path, "[server]\napi_prefix = \"/fn\"\n").unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.server.api_prefix, "/fn");
    }

    #[test]
    fn test_validation_error_message_lists_all() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fnserve.toml");
        fs::write(&path, "[build]\nextensions = []\n[compiler]\nparallelism = 0\n").unwrap();

        let err = load_config(&path).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("build.extensions must not be empty"), "{msg}");
        assert!(msg.contains("compiler.parallelism"), "{msg}");
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
