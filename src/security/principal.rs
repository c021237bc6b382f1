//! Caller identity middleware.
//!
//! The pipeline does not authenticate. An upstream gateway does, and forwards
//! the principal as request headers; these stages turn them into caller
//! attributes and reject anonymous requests.
//!
//! Principal headers are only as trustworthy as the path they arrive on.
//! With a gateway secret configured, requests that do not carry it keep an
//! empty principal.

use axum::http::StatusCode;
use sha2::{Digest, Sha256};

use crate::http::{HttpMethod, Request, Response};
use crate::middleware::Middleware;

/// Copies configured request headers into caller attributes.
#[derive(Debug, Clone, Default)]
pub struct PrincipalHeaders {
    /// (attribute, header) pairs.
    mapping: Vec<(String, String)>,
    secret: Option<GatewaySecret>,
}

#[derive(Clone)]
struct GatewaySecret {
    header: String,
    digest: Vec<u8>,
}

impl std::fmt::Debug for GatewaySecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySecret").field("header", &self.header).finish_non_exhaustive()
    }
}

impl PrincipalHeaders {
    pub fn new(mapping: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            mapping: mapping.into_iter().collect(),
            secret: None,
        }
    }

    /// Only read principal headers from requests whose `header` equals
    /// `secret`.
    pub fn require_secret(mut self, header: &str, secret: &str) -> Self {
        self.secret = Some(GatewaySecret {
            header: header.to_string(),
            digest: Sha256::digest(secret.as_bytes()).to_vec(),
        });
        self
    }

    fn from_gateway(&self, req: &Request) -> bool {
        let Some(secret) = &self.secret else {
            return true;
        };
        req.header(&secret.header)
            .map(|presented| Sha256::digest(presented.as_bytes()).as_slice() == secret.digest.as_slice())
            .unwrap_or(false)
    }
}

impl Middleware for PrincipalHeaders {
    fn handle(&self, req: &mut Request, _res: &mut Response) {
        if !self.from_gateway(req) {
            tracing::debug!(request_id = %req.id(), "Principal headers ignored without gateway secret");
            return;
        }
        for (attribute, header) in &self.mapping {
            let value = match req.header(header).map(str::trim) {
                Some(v) if !v.is_empty() => v.to_string(),
                _ => continue,
            };
            req.principal_mut().insert(attribute.clone(), value);
        }
    }
}

/// Halts requests with no caller attributes.
///
/// Redirects to the login page when one is configured, except for AJAX
/// requests which always get 401.
#[derive(Debug, Clone, Default)]
pub struct RequirePrincipal {
    login_url: Option<String>,
}

impl RequirePrincipal {
    pub fn new(login_url: Option<String>) -> Self {
        Self { login_url }
    }
}

impl Middleware for RequirePrincipal {
    fn handle(&self, req: &mut Request, res: &mut Response) {
        if !req.principal().is_empty() {
            return;
        }
        match &self.login_url {
            Some(url) if req.method() != HttpMethod::Ajax => res.redirect(url),
            _ => res.deny(StatusCode::UNAUTHORIZED, "Unauthorized"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::AttributeValue;
    use crate::http::ResponseState;

    fn headers() -> PrincipalHeaders {
        PrincipalHeaders::new([
            ("id".to_string(), "x-doorpad-user".to_string()),
            ("role".to_string(), "x-doorpad-role".to_string()),
        ])
    }

    #[test]
    fn test_headers_become_attributes() {
        let mut req = Request::new(HttpMethod::Get, "/")
            .with_header("x-doorpad-user", "42")
            .with_header("x-doorpad-role", " admin ");
        headers().handle(&mut req, &mut Response::new());

        assert_eq!(req.principal().get("role"), Some(&AttributeValue::from("admin")));
        assert!(req.principal().get("id").unwrap().matches(&AttributeValue::Int(42)));
    }

    #[test]
    fn test_blank_header_is_ignored() {
        let mut req = Request::new(HttpMethod::Get, "/").with_header("x-doorpad-role", "  ");
        headers().handle(&mut req, &mut Response::new());
        assert!(req.principal().is_empty());
    }

    #[test]
    fn test_principal_needs_gateway_secret_when_configured() {
        let mw = headers().require_secret("x-doorpad-gateway-secret", "s3cret");

        let mut spoofed = Request::new(HttpMethod::Get, "/").with_header("x-doorpad-role", "admin");
        mw.handle(&mut spoofed, &mut Response::new());
        assert!(spoofed.principal().is_empty());

        let mut wrong = Request::new(HttpMethod::Get, "/")
            .with_header("x-doorpad-role", "admin")
            .with_header("x-doorpad-gateway-secret", "guess");
        mw.handle(&mut wrong, &mut Response::new());
        assert!(wrong.principal().is_empty());

        let mut forwarded = Request::new(HttpMethod::Get, "/")
            .with_header("x-doorpad-role", "admin")
            .with_header("x-doorpad-gateway-secret", "s3cret");
        mw.handle(&mut forwarded, &mut Response::new());
        assert_eq!(forwarded.principal().get("role"), Some(&AttributeValue::from("admin")));
    }

    #[test]
    fn test_anonymous_is_denied_without_login_url() {
        let mut res = Response::new();
        RequirePrincipal::new(None).handle(&mut Request::new(HttpMethod::Get, "/"), &mut res);
        assert_eq!(res.state(), ResponseState::Denied);
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_anonymous_is_redirected_to_login() {
        let mw = RequirePrincipal::new(Some("/login/".into()));

        let mut res = Response::new();
        mw.handle(&mut Request::new(HttpMethod::Get, "/visitors/"), &mut res);
        assert_eq!(res.state(), ResponseState::Redirected);
        assert_eq!(res.header("location"), Some("/login/"));

        let mut res = Response::new();
        mw.handle(&mut Request::new(HttpMethod::Ajax, "/visitors/"), &mut res);
        assert_eq!(res.state(), ResponseState::Denied);
    }

    #[test]
    fn test_known_principal_passes() {
        let mut req = Request::new(HttpMethod::Get, "/");
        req.principal_mut().insert("id", 7);
        let mut res = Response::new();
        RequirePrincipal::new(None).handle(&mut req, &mut res);
        assert_eq!(res.state(), ResponseState::Continue);
    }
}
