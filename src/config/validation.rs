//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check that policy entries are usable (patterns compile, methods known)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::RelayConfig;
use crate::relay::method::RelayMethod;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("relay.path must start with '/', got '{0}'")]
    RelativePath(String),

    #[error("relay.target_param must not be empty")]
    EmptyTargetParam,

    #[error("relay.public_url must be an absolute http(s) URL, got '{0}'")]
    InvalidPublicUrl(String),

    #[error("policy.allowed_url_patterns: '{pattern}' does not compile: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("policy.allowed_methods: unsupported method '{0}'")]
    UnknownMethod(String),

    #[error("policy.allowed_content_types: '{0}' is not a media type")]
    InvalidContentType(String),

    #[error("observability.log_format must be 'text' or 'json', got '{0}'")]
    UnknownLogFormat(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.listener.max_in_flight == 0 {
        errors.push(ValidationError::Zero("listener.max_in_flight"));
    }

    let relay = &config.relay;
    if !relay.path.starts_with('/') {
        errors.push(ValidationError::RelativePath(relay.path.clone()));
    }
    if relay.target_param.trim().is_empty() {
        errors.push(ValidationError::EmptyTargetParam);
    }
    if let Some(public_url) = &relay.public_url {
        let usable = Url::parse(public_url)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
            .unwrap_or(false);
        if !usable {
            errors.push(ValidationError::InvalidPublicUrl(public_url.clone()));
        }
    }
    if relay.stream_buffer_chunks == 0 {
        errors.push(ValidationError::Zero("relay.stream_buffer_chunks"));
    }

    let timeouts = &config.timeouts;
    for (name, value) in [
        ("timeouts.connect_secs", timeouts.connect_secs),
        ("timeouts.request_secs", timeouts.request_secs),
        ("timeouts.idle_secs", timeouts.idle_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero(name));
        }
    }

    let policy = &config.policy;
    for pattern in &policy.allowed_url_patterns {
        if let Err(e) = regex::Regex::new(pattern) {
            errors.push(ValidationError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            });
        }
    }
    for method in &policy.allowed_methods {
        if RelayMethod::parse(method).is_none() {
            errors.push(ValidationError::UnknownMethod(method.clone()));
        }
    }
    for content_type in &policy.allowed_content_types {
        let well_formed = content_type
            .split_once('/')
            .map(|(t, s)| !t.trim().is_empty() && !s.trim().is_empty())
            .unwrap_or(false);
        if !well_formed {
            errors.push(ValidationError::InvalidContentType(content_type.clone()));
        }
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: observability.metrics_address.clone(),
        });
    }
    if !matches!(observability.log_format.as_str(), "text" | "json") {
        errors.push(ValidationError::UnknownLogFormat(observability.log_format.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
