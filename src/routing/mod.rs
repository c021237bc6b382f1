//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (per host, at first request):
//!     RouteSource closure
//!     → table.rs (tags, routes per method, global middleware, domain groups)
//!     → matcher.rs (compile patterns to anchored regexes)
//!     → Freeze as immutable RouteMatcher, cached by hosts.rs
//!
//! Incoming Request (host, method, path)
//!     → hosts.rs (matcher for host)
//!     → matcher.rs (first matching route for method, else 404 route)
//!     → Return: RouteMatch or RouteNotFound
//! ```
//!
//! # Design Decisions
//! - Routes compiled once, immutable at runtime
//! - Deterministic: same input always matches same route
//! - First match wins (ordered by registration)
//! - The 404 and 500 routes are method-independent

pub mod domain;
pub mod hosts;
pub mod matcher;
pub mod table;
pub mod tags;

pub use domain::{DomainList, DomainPattern};
pub use hosts::{HostRoutes, RouteSource};
pub use matcher::{CompiledRoute, RouteMatch, RouteMatcher};
pub use table::{
    normalize_path, AclRequirement, HandlerRef, HostScope, OneOrMany, RouteDefinition, RouteOptions,
    RouteTable,
};
pub use tags::RegexTagRegistry;
