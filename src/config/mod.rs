//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → DoorpadConfig (validated, immutable)
//!     → lifecycle::startup builds the dispatcher from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Route entries stay loosely typed until the route table parses them,
//!   so option errors carry route-table error kinds

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AclConfig, AclEntryConfig, AclRuleConfig, DomainConfig, DoorpadConfig, MiddlewareConfig,
    ObservabilityConfig, RoutingConfig, ServerConfig,
};
pub use validation::{validate_config, ValidationError};
