//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate the listener address and log level
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - ProxyConfig → Result<(), Vec<ValidationError>>; the only side effect is
//!   resolving a host name in the bind address
//! - The upstream URL is not validated here: a missing or unusable upstream
//!   is answered per request, it never stops the process

use std::net::ToSocketAddrs;
use thiserror::Error;

use crate::config::schema::ProxyConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a host:port that resolves")]
    BindAddress(String),

    #[error("observability.log_level {0:?} is not one of trace, debug, info, warn, error")]
    LogLevel(String),
}

/// Host names are accepted, as `TcpListener::bind` accepts them.
fn resolves(address: &str) -> bool {
    address
        .to_socket_addrs()
        .map(|mut addrs| addrs.next().is_some())
        .unwrap_or(false)
}

/// Check a configuration before it is accepted.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !resolves(&config.listener.bind_address) {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
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
