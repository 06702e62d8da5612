//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, capacities > 0, ports valid)
//! - Validate addresses parse before any listener is bound
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CoreConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::CoreConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &CoreConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a socket address", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be > 0"));
    }

    if config.cache.port == 0 {
        errors.push(ValidationError::new("cache.port", "must be a valid port"));
    }
    if config.cache.db < 0 {
        errors.push(ValidationError::new("cache.db", "must be >= 0"));
    }
    if config.cache.namespace.is_empty() || config.cache.namespace.contains(':') {
        errors.push(ValidationError::new(
            "cache.namespace",
            "must be non-empty and must not contain ':'",
        ));
    }
    for (use_case, ttl) in &config.cache.ttl_policies {
        if *ttl == 0 {
            errors.push(ValidationError::new(
                &format!("cache.ttl_policies.{}", use_case),
                "must be > 0",
            ));
        }
    }
    if config.cache.default_ttl_secs == 0 {
        errors.push(ValidationError::new("cache.default_ttl_secs", "must be > 0"));
    }

    if config.health.default_timeout_ms == 0 {
        errors.push(ValidationError::new("health.default_timeout_ms", "must be > 0"));
    }
    if config.health.periodic_enabled && config.health.interval_secs == 0 {
        errors.push(ValidationError::new("health.interval_secs", "must be > 0"));
    }

    if config.rate_limit.enabled {
        if config.rate_limit.limit == 0 || config.rate_limit.compute_limit == 0 {
            errors.push(ValidationError::new("rate_limit.limit", "limits must be > 0"));
        }
        if config.rate_limit.window_ms == 0 || config.rate_limit.compute_window_ms == 0 {
            errors.push(ValidationError::new("rate_limit.window_ms", "windows must be > 0"));
        }
        if config.rate_limit.max_keys == 0 {
            errors.push(ValidationError::new("rate_limit.max_keys", "must be > 0"));
        }
    }

    if config.metrics.response_buffer_capacity == 0 {
        errors.push(ValidationError::new(
            "metrics.response_buffer_capacity",
            "must be > 0",
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "'{}' is not a socket address",
                config.observability.metrics_address
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
