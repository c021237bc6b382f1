//! Security response headers.
//!
//! # Design Decisions
//! - Set before the handler runs; a handler may still override them
//! - Applied to halted responses too when listed ahead of the halting stage

use crate::http::{Request, Response};
use crate::middleware::Middleware;

/// Adds conservative browser security headers.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    headers: Vec<(&'static str, &'static str)>,
}

impl Default for SecurityHeaders {
    fn default() -> Self {
        Self {
            headers: vec![
                ("x-content-type-options", "nosniff"),
                ("x-frame-options", "DENY"),
                ("referrer-policy", "same-origin"),
            ],
        }
    }
}

impl Middleware for SecurityHeaders {
    fn handle(&self, _req: &mut Request, res: &mut Response) {
        for (name, value) in &self.headers {
            res.set_header(name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpMethod, ResponseState};

    #[test]
    fn test_headers_added_without_halting() {
        let mut res = Response::new();
        SecurityHeaders::default().handle(&mut Request::new(HttpMethod::Get, "/"), &mut res);
        assert_eq!(res.header("x-frame-options"), Some("DENY"));
        assert_eq!(res.header("x-content-type-options"), Some("nosniff"));
        assert_eq!(res.header("referrer-policy"), Some("same-origin"));
        assert_eq!(res.state(), ResponseState::Continue);
    }
}
