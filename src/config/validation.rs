//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, capacities > 0)
//! - Check URLs and header names are usable by the transport
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>

use reqwest::header::{HeaderName, HeaderValue};
use thiserror::Error;
use url::Url;

use crate::config::schema::ClientConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("transport.base_url `{0}` is not an absolute http(s) URL")]
    InvalidBaseUrl(String),

    #[error("transport.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("transport.connect_secs ({connect}) exceeds transport.request_secs ({request})")]
    ConnectExceedsRequest { connect: u64, request: u64 },

    #[error("transport.default_headers contains invalid header `{0}`")]
    InvalidHeader(String),

    #[error("registry.{0} must be greater than zero")]
    ZeroCapacity(&'static str),

    #[error("observability.log_level `{0}` is not a known level")]
    UnknownLogLevel(String),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let transport = &config.transport;

    if let Some(base) = &transport.base_url {
        match Url::parse(base) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => errors.push(ValidationError::InvalidBaseUrl(base.clone())),
        }
    }

    if transport.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    if transport.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("request_secs"));
    }
    if transport.connect_secs > transport.request_secs && transport.request_secs > 0 {
        errors.push(ValidationError::ConnectExceedsRequest {
            connect: transport.connect_secs,
            request: transport.request_secs,
        });
    }

    for (name, value) in &transport.default_headers {
        let usable =
            HeaderName::from_bytes(name.as_bytes()).is_ok() && HeaderValue::from_str(value).is_ok();
        if !usable {
            errors.push(ValidationError::InvalidHeader(name.clone()));
        }
    }

    if config.registry.max_unauthorized_held == 0 {
        errors.push(ValidationError::ZeroCapacity("max_unauthorized_held"));
    }
    if config.registry.event_capacity == 0 {
        errors.push(ValidationError::ZeroCapacity("event_capacity"));
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(config.observability.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
