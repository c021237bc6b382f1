//! Dispatch subsystem: the composed request pipeline.
//!
//! # Data Flow
//! ```text
//! Request (host, method, path, headers, body)
//!     → routing (matcher for host → route + slugs, or 404 route)
//!     → middleware chain (globals, then route's own) → halted? return
//!     → ACL gate (routes with an `acl` requirement) → denied? 403
//!     → handler.rs (controller@action or inline) → Response
//!     → handler error? → 500 route, or Error::Handler
//! ```

pub mod builtin;
pub mod dispatcher;
pub mod handler;

pub use builtin::register_builtin_handlers;
pub use dispatcher::Dispatcher;
pub use handler::{call_guarded, handler_fn, handler_key, FnHandler, Handler, HandlerRegistry};
