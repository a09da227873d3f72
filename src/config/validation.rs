//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: InterceptorConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::InterceptorConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("logging.level: unknown level {0:?}")]
    UnknownLogLevel(String),

    #[error("access_log.file must not be empty")]
    EmptyLogPath,
}

/// Check a parsed configuration, collecting every problem.
pub fn validate_config(config: &InterceptorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.listener.body_limit_bytes == 0 {
        errors.push(ValidationError::Zero {
            field: "listener.body_limit_bytes",
        });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "timeouts.request_secs",
        });
    }
    if matches!(config.access_log.file.as_deref(), Some(path) if path.trim().is_empty()) {
        errors.push(ValidationError::EmptyLogPath);
    }
    if !LOG_LEVELS.contains(&config.logging.level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::UnknownLogLevel(config.logging.level.clone()));
    }
    if config.metrics.enabled && config.metrics.address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "metrics.address",
            value: config.metrics.address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
