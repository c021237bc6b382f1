//! Maintenance mode.

use axum::http::StatusCode;

use crate::http::{Request, Response};
use crate::middleware::Middleware;

/// Denies every request with 503 while enabled.
#[derive(Debug, Clone)]
pub struct Maintenance {
    enabled: bool,
    message: String,
}

impl Maintenance {
    pub fn new(enabled: bool, message: impl Into<String>) -> Self {
        Self {
            enabled,
            message: message.into(),
        }
    }
}

impl Middleware for Maintenance {
    fn handle(&self, _req: &mut Request, res: &mut Response) {
        if self.enabled {
            res.set_header("retry-after", "120");
            res.deny(StatusCode::SERVICE_UNAVAILABLE, self.message.clone());
        }
    }
}
