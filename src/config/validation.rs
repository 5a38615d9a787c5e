//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check prefix shape for CDN rules and mounts
//! - Validate value ranges (timeouts > 0, non-empty roots)
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: GatewayConfig -> Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::GatewayConfig;

/// A single semantic validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// Human-readable description.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration, collecting every error found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            "not a valid socket address",
        ));
    }

    if !is_route_prefix(&config.cdn.prefix) {
        errors.push(ValidationError::new(
            "cdn.prefix",
            "must start and end with '/'",
        ));
    }
    for (i, rule) in config.cdn.rules.iter().enumerate() {
        if !is_route_prefix(&rule.prefix) {
            errors.push(ValidationError::new(
                format!("cdn.rules[{i}].prefix"),
                "must start and end with '/'",
            ));
        }
        if !rule.prefix.starts_with(&config.cdn.prefix) {
            errors.push(ValidationError::new(
                format!("cdn.rules[{i}].prefix"),
                "must fall under cdn.prefix",
            ));
        }
        if !rule.origin.starts_with("http://") && !rule.origin.starts_with("https://") {
            errors.push(ValidationError::new(
                format!("cdn.rules[{i}].origin"),
                "must be an absolute http(s) URL",
            ));
        }
    }
    if config.cdn.timeout_secs == 0 {
        errors.push(ValidationError::new("cdn.timeout_secs", "must be > 0"));
    }

    if config.tokens.max_entries == 0 {
        errors.push(ValidationError::new("tokens.max_entries", "must be > 0"));
    }

    if !config.tunnel.endpoint_suffix.ends_with('/') {
        errors.push(ValidationError::new(
            "tunnel.endpoint_suffix",
            "must end with '/'",
        ));
    }

    for (i, mount) in config.mounts.iter().enumerate() {
        if !is_route_prefix(&mount.prefix) {
            errors.push(ValidationError::new(
                format!("mounts[{i}].prefix"),
                "must start and end with '/'",
            ));
        }
        if mount.root.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                format!("mounts[{i}].root"),
                "must not be empty",
            ));
        }
    }

    for (i, path) in config.service_worker.allowed_paths.iter().enumerate() {
        if !path.starts_with('/') {
            errors.push(ValidationError::new(
                format!("service_worker.allowed_paths[{i}]"),
                "must start with '/'",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_route_prefix(s: &str) -> bool {
    s.len() >= 2 && s.starts_with('/') && s.ends_with('/')
}
