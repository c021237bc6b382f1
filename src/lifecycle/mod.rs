//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → middleware registry → handler registry
//!     → ACL engine → route source → Dispatcher (validation build)
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT or trigger() → stop accepting → drain in-flight → exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: nothing accepts traffic until the dispatcher exists
//! - Fail fast: any bootstrap error is fatal

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{bootstrap, build_acl, route_source};
