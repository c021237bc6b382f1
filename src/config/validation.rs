//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (ACL rules reference existing groups)
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DoorpadConfig → Result<(), Vec<ValidationError>>
//! - Runs before bootstrap builds routes, middleware and ACL rules

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::DoorpadConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 2] = ["pretty", "json"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
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

/// Check everything serde cannot.
pub fn validate_config(config: &DoorpadConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let server = &config.server;
    if server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("server.bind_address", "not a socket address"));
    }
    if server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be greater than zero"));
    }
    if server.max_body_bytes == 0 {
        errors.push(ValidationError::new("server.max_body_bytes", "must be greater than zero"));
    }
    if server.default_host.trim().is_empty() {
        errors.push(ValidationError::new("server.default_host", "must not be empty"));
    }
    if server.max_cached_hosts == 0 {
        errors.push(ValidationError::new("server.max_cached_hosts", "must be greater than zero"));
    }

    let obs = &config.observability;
    if !LOG_LEVELS.contains(&obs.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("expected one of {}", LOG_LEVELS.join(", ")),
        ));
    }
    if !LOG_FORMATS.contains(&obs.log_format.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_format",
            format!("expected one of {}", LOG_FORMATS.join(", ")),
        ));
    }
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("observability.metrics_address", "not a socket address"));
    }

    for (i, domain) in config.routing.domains.iter().enumerate() {
        if domain.hosts.is_empty() {
            errors.push(ValidationError::new(
                format!("routing.domains[{}].hosts", i),
                "at least one domain pattern is required",
            ));
        }
    }

    for (attr, header) in &config.middleware.principal_headers {
        if attr.trim().is_empty() || header.trim().is_empty() {
            errors.push(ValidationError::new(
                "middleware.principal_headers",
                "attribute and header names must not be empty",
            ));
        }
    }
    if let Some(secret) = &config.middleware.gateway_secret {
        if secret.trim().is_empty() {
            errors.push(ValidationError::new("middleware.gateway_secret", "must not be empty when set"));
        }
        if config.middleware.gateway_secret_header.trim().is_empty() {
            errors.push(ValidationError::new("middleware.gateway_secret_header", "must not be empty"));
        }
    }

    for (name, entries) in &config.acl.groups {
        if entries.is_empty() {
            errors.push(ValidationError::new(format!("acl.groups.{}", name), "group has no rules"));
        }
    }

    for (i, rule) in config.acl.rules.iter().enumerate() {
        let field = format!("acl.rules[{}]", i);
        if rule.controller.trim().is_empty() || rule.action.trim().is_empty() {
            errors.push(ValidationError::new(&field, "controller and action are required"));
        }
        match (&rule.fields, &rule.group) {
            (Some(_), Some(_)) => errors.push(ValidationError::new(&field, "use either fields or group, not both")),
            (None, None) => errors.push(ValidationError::new(&field, "fields or group is required")),
            (None, Some(group)) if !config.acl.groups.contains_key(group) => {
                errors.push(ValidationError::new(&field, format!("unknown group '{}'", group)))
            }
            (None, Some(_)) if !rule.granules.is_empty() => {
                errors.push(ValidationError::new(&field, "granules come from the group"))
            }
            _ => {}
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
