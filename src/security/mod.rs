//! Security subsystem: the built-in middleware.
//!
//! # Data Flow
//! ```text
//! Typical global chain:
//!     → maintenance.rs (deny everything while down)
//!     → principal.rs (request headers → caller attributes)
//!     → principal.rs require_principal (anonymous? deny or redirect)
//!     → headers.rs (security response headers)
//!     → ACL gate and handler (dispatch)
//! ```
//!
//! # Design Decisions
//! - Fail closed: a stage that cannot decide denies
//! - Nothing is registered implicitly; routes and globals name what they use
//! - Identifiers are fixed so configuration files stay portable

pub mod headers;
pub mod maintenance;
pub mod principal;

pub use headers::SecurityHeaders;
pub use maintenance::Maintenance;
pub use principal::{PrincipalHeaders, RequirePrincipal};

use std::sync::Arc;

use crate::config::MiddlewareConfig;
use crate::error::Error;
use crate::middleware::{Middleware, MiddlewareRegistry};

pub const PRINCIPAL_HEADERS: &str = "principal_headers";
pub const REQUIRE_PRINCIPAL: &str = "require_principal";
pub const MAINTENANCE: &str = "maintenance";
pub const SECURITY_HEADERS: &str = "security_headers";

/// Register every built-in middleware under its fixed identifier.
///
/// Identifiers the application already registered are left alone.
pub fn register_builtins(registry: &mut MiddlewareRegistry, config: &MiddlewareConfig) -> Result<(), Error> {
    let mut principal = PrincipalHeaders::new(
        config
            .principal_headers
            .iter()
            .map(|(attr, header)| (attr.clone(), header.clone())),
    );
    if let Some(secret) = &config.gateway_secret {
        principal = principal.require_secret(&config.gateway_secret_header, secret);
    }
    let builtins: [(&str, Arc<dyn Middleware>); 4] = [
        (PRINCIPAL_HEADERS, Arc::new(principal)),
        (REQUIRE_PRINCIPAL, Arc::new(RequirePrincipal::new(config.login_url.clone()))),
        (
            MAINTENANCE,
            Arc::new(Maintenance::new(config.maintenance, config.maintenance_message.clone())),
        ),
        (SECURITY_HEADERS, Arc::new(SecurityHeaders::default())),
    ];

    for (id, middleware) in builtins {
        if registry.contains(id) {
            tracing::debug!(middleware = id, "Built-in middleware overridden by application");
            continue;
        }
        registry.register_arc(id, middleware)?;
    }
    Ok(())
}
