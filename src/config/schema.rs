//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for doorpad.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::acl::{FieldMatchSet, Granules};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DoorpadConfig {
    /// Listener and request limits.
    pub server: ServerConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    /// Regex tags, global middleware, routes and domain groups.
    pub routing: RoutingConfig,

    /// Settings for the built-in middleware.
    pub middleware: MiddlewareConfig,

    /// Access-control rules.
    pub acl: AclConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Largest request body accepted, in bytes.
    pub max_body_bytes: usize,

    /// Host used when a request carries none.
    pub default_host: String,

    /// Upper bound on route tables kept in memory, one per distinct set of
    /// matching domain groups.
    pub max_cached_hosts: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            default_host: "localhost".to_string(),
            max_cached_hosts: 64,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Route registration, mirroring the route table API.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RoutingConfig {
    /// Tag → regex fragment, e.g. `"{num}" = "[0-9]+"`.
    pub regex: BTreeMap<String, String>,

    /// Middleware run for every route, in order.
    pub global_middleware: Vec<String>,

    /// Route entries: a `url` plus route options.
    pub routes: Vec<toml::Value>,

    /// Groups applied only for matching hosts.
    pub domains: Vec<DomainConfig>,
}

/// Routes and middleware for a set of domain patterns.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DomainConfig {
    /// Patterns such as "*.example.com".
    pub hosts: Vec<String>,

    pub global_middleware: Vec<String>,

    pub routes: Vec<toml::Value>,
}

/// Settings for the built-in middleware.
///
/// `principal_headers` trusts whatever the client sends in the mapped
/// headers. Either keep the server reachable only through the gateway that
/// sets them, or set `gateway_secret` so the headers are read only from
/// requests that carry it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MiddlewareConfig {
    /// Caller attribute → request header carrying it.
    pub principal_headers: BTreeMap<String, String>,

    /// Shared secret the gateway sends alongside principal headers.
    pub gateway_secret: Option<String>,

    /// Header carrying `gateway_secret`.
    pub gateway_secret_header: String,

    /// Where `require_principal` redirects anonymous callers. Denies with
    /// 401 when unset.
    pub login_url: Option<String>,

    /// When true, `maintenance` denies every request with 503.
    pub maintenance: bool,

    /// Body sent while in maintenance.
    pub maintenance_message: String,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        let mut principal_headers = BTreeMap::new();
        principal_headers.insert("id".to_string(), "x-doorpad-user".to_string());
        principal_headers.insert("role".to_string(), "x-doorpad-role".to_string());
        Self {
            principal_headers,
            gateway_secret: None,
            gateway_secret_header: "x-doorpad-gateway-secret".to_string(),
            login_url: None,
            maintenance: false,
            maintenance_message: "Down for maintenance".to_string(),
        }
    }
}

/// Access-control configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AclConfig {
    /// Named rule groups.
    pub groups: BTreeMap<String, Vec<AclEntryConfig>>,

    /// Rules in registration order.
    pub rules: Vec<AclRuleConfig>,
}

/// One `(fields, granules)` pair.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AclEntryConfig {
    pub fields: FieldMatchSet,

    /// Empty grants everything.
    #[serde(default)]
    pub granules: Vec<String>,
}

impl AclEntryConfig {
    pub fn granules(&self) -> Granules {
        Granules::only(self.granules.iter().cloned())
    }
}

/// A rule for one controller/action, given inline or by group name.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AclRuleConfig {
    pub controller: String,
    pub action: String,

    #[serde(default)]
    pub fields: Option<FieldMatchSet>,

    #[serde(default)]
    pub granules: Vec<String>,

    #[serde(default)]
    pub group: Option<String>,
}
