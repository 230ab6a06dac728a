//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, parallelism > 0)
//! - Check the compiler command can address its inputs and outputs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: FnServeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use crate::config::schema::FnServeConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("build.extensions must not be empty")]
    NoExtensions,

    #[error("build.extensions entry {0:?} must not be empty or start with '.'")]
    BadExtension(String),

    #[error("server.api_prefix {0:?} must start with '/' and not end with '/'")]
    BadApiPrefix(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("compiler.args must contain the {0} placeholder")]
    MissingPlaceholder(&'static str),

    #[error("compiler.program must not be empty")]
    NoCompiler,

    #[error("{field} {value:?} is not a valid socket address")]
    BadAddress { field: &'static str, value: String },
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &FnServeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.build.extensions.is_empty() {
        errors.push(ValidationError::NoExtensions);
    }
    for ext in &config.build.extensions {
        if ext.is_empty() || ext.starts_with('.') {
            errors.push(ValidationError::BadExtension(ext.clone()));
        }
    }

    let prefix = &config.server.api_prefix;
    if !prefix.starts_with('/') || (prefix.len() > 1 && prefix.ends_with('/')) {
        errors.push(ValidationError::BadApiPrefix(prefix.clone()));
    }

    for (field, value) in [
        ("server.request_timeout_secs", config.server.request_timeout_secs),
        ("server.handler_timeout_secs", config.server.handler_timeout_secs),
        ("server.max_body_size", config.server.max_body_size as u64),
        ("listener.max_connections", config.listener.max_connections as u64),
        ("compiler.parallelism", config.compiler.parallelism as u64),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if config.compiler.program.trim().is_empty() {
        errors.push(ValidationError::NoCompiler);
    }
    for placeholder in ["{source}", "{output}"] {
        if !config.compiler.args.iter().any(|a| a.contains(placeholder)) {
            errors.push(ValidationError::MissingPlaceholder(placeholder));
        }
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::BadAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
