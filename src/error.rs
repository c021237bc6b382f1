//! Error kinds for the request pipeline.
//!
//! Configuration-time errors are programmer errors: they are raised while the
//! route table, middleware registry and ACL engine are being built and abort
//! bootstrap. Request-time failures are limited to "no route" and handler
//! failures with no 500 route to fall back on.
//!
//! Middleware denial and ACL denial are NOT errors. They travel as response
//! state and authorization values respectively.

use axum::http::StatusCode;

use crate::http::HttpMethod;

/// Error returned by a request handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A handler panicked; carries the panic message.
#[derive(Debug, thiserror::Error)]
#[error("handler panicked: {0}")]
pub struct HandlerPanic(pub String);

impl HandlerPanic {
    pub(crate) fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self(message)
    }
}

/// Crate-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A regex tag, tag fragment or domain pattern is empty or does not compile.
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    /// A route was registered without a URL.
    #[error("route URL is missing")]
    MissingRoute,

    /// Route options are not a table, or hold a value of the wrong shape.
    #[error("invalid route options: {0}")]
    InvalidOptions(String),

    /// An ACL rule was registered with no fields to match.
    #[error("ACL rule for {controller}::{action} has an empty field set")]
    EmptyFieldSet { controller: String, action: String },

    /// A mutating call received an empty or otherwise unusable argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A middleware identifier is empty or was never registered.
    #[error("invalid middleware listener: {0}")]
    InvalidListener(String),

    /// A route targets a controller/action pair with no registered handler.
    #[error("no handler registered for {0}")]
    UnknownHandler(String),

    /// No route matched and no 404 route is registered.
    #[error("no route matches {method} {path}")]
    RouteNotFound { method: HttpMethod, path: String },

    /// A handler failed and no 500 route is registered (or it failed too).
    #[error("handler failed: {0}")]
    Handler(#[source] HandlerError),
}

impl Error {
    /// True for errors raised while building configuration objects.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Error::RouteNotFound { .. } | Error::Handler(_))
    }

    /// Status reported to the client when this error escapes the dispatcher.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
