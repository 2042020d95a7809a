//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, address parses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AtcConfig → Result<(), Vec<ValidationError>>
//! - Whether targets exist is decided later, against the module graph

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AtcConfig;

pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("server.request_timeout_secs must be greater than zero")]
    RequestTimeout,

    #[error("target must name at least one module")]
    EmptyTarget,

    #[error("target contains a blank module name")]
    BlankTarget,

    #[error("modules.watch_interval_secs must be greater than zero")]
    WatchInterval,

    #[error("observability.log_level {0:?} is not one of trace, debug, info, warn, error")]
    LogLevel(String),
}

pub fn validate_config(config: &AtcConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.server.bind_address.clone(),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::RequestTimeout);
    }
    if config.target.is_empty() {
        errors.push(ValidationError::EmptyTarget);
    } else if config.target.iter().any(|t| t.trim().is_empty()) {
        errors.push(ValidationError::BlankTarget);
    }
    if config.modules.watch_interval_secs == 0 {
        errors.push(ValidationError::WatchInterval);
    }
    if !LOG_LEVELS.contains(&config.observability.log_level.as_str()) {
        errors.push(ValidationError::LogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
