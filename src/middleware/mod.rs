//! Middleware subsystem.
//!
//! # Data Flow
//! ```text
//! Bootstrap:
//!     registry.rs (identifier → middleware instance)
//!
//! Request:
//!     global ids (registration order) + route ids (registration order)
//!     → chain.rs (resolve ids, run each stage)
//!     → after every stage: response state Continue? next : halt
//! ```
//!
//! # Design Decisions
//! - Stages return nothing; they deny or redirect by mutating the response
//! - A halted chain never runs later stages or the handler
//! - Unknown identifiers are rejected at bootstrap, not per request

pub mod chain;
pub mod registry;

use std::fmt;

use crate::http::{Request, Response};

pub use chain::MiddlewareChain;
pub use registry::MiddlewareRegistry;

/// One pipeline stage.
pub trait Middleware: Send + Sync {
    fn handle(&self, req: &mut Request, res: &mut Response);
}

impl<M: Middleware + ?Sized> Middleware for std::sync::Arc<M> {
    fn handle(&self, req: &mut Request, res: &mut Response) {
        (**self).handle(req, res)
    }
}

/// Middleware built from a closure. See [`from_fn`].
#[derive(Clone)]
pub struct FnMiddleware<F> {
    f: F,
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut Request, &mut Response) + Send + Sync,
{
    fn handle(&self, req: &mut Request, res: &mut Response) {
        (self.f)(req, res)
    }
}

impl<F> fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnMiddleware")
    }
}

/// Wrap a closure as middleware.
pub fn from_fn<F>(f: F) -> FnMiddleware<F>
where
    F: Fn(&mut Request, &mut Response) + Send + Sync,
{
    FnMiddleware { f }
}

/// A middleware identifier, or an arbitrarily nested list of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiddlewareIds {
    One(String),
    Many(Vec<MiddlewareIds>),
}

impl MiddlewareIds {
    /// Depth-first flatten, preserving order.
    pub fn flatten(self) -> Vec<String> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(self, out: &mut Vec<String>) {
        match self {
            MiddlewareIds::One(id) => out.push(id),
            MiddlewareIds::Many(ids) => ids.into_iter().for_each(|ids| ids.flatten_into(out)),
        }
    }
}

impl From<&str> for MiddlewareIds {
    fn from(id: &str) -> Self {
        MiddlewareIds::One(id.to_string())
    }
}

impl From<String> for MiddlewareIds {
    fn from(id: String) -> Self {
        MiddlewareIds::One(id)
    }
}

impl From<&String> for MiddlewareIds {
    fn from(id: &String) -> Self {
        MiddlewareIds::One(id.clone())
    }
}

impl<T: Into<MiddlewareIds>> From<Vec<T>> for MiddlewareIds {
    fn from(ids: Vec<T>) -> Self {
        MiddlewareIds::Many(ids.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<MiddlewareIds>, const N: usize> From<[T; N]> for MiddlewareIds {
    fn from(ids: [T; N]) -> Self {
        MiddlewareIds::Many(ids.into_iter().map(Into::into).collect())
    }
}

impl<T: Clone + Into<MiddlewareIds>> From<&[T]> for MiddlewareIds {
    fn from(ids: &[T]) -> Self {
        MiddlewareIds::Many(ids.iter().cloned().map(Into::into).collect())
    }
}
