//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (port usable, timeouts > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ServerConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("port must be between 1 and 65535")]
    ZeroPort,

    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),
}

/// Check every semantic rule and report all violations at once.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.port == 0 {
        errors.push(ValidationError::ZeroPort);
    }

    let positives = [
        ("listener.read_timeout_secs", config.listener.read_timeout_secs),
        ("listener.write_timeout_secs", config.listener.write_timeout_secs),
        ("listener.max_connections", config.listener.max_connections as u64),
        ("shutdown.grace_period_ms", config.shutdown.grace_period_ms),
    ];
    for (field, value) in positives {
        if value == 0 {
            errors.push(ValidationError::NotPositive { field });
        }
    }

    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::MetricsAddress(addr.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
