//! Request-scoped state for one pass through the pipeline.
//!
//! # Responsibilities
//! - Classify the HTTP method (AJAX is detected from `X-Requested-With`)
//! - Carry the request ID, host, path, headers and body
//! - Hold the caller attributes middleware attach for ACL checks
//! - Hold slug values and matched-route info once routing has run
//!
//! # Design Decisions
//! - Everything here is owned by the request; nothing leaks into shared state
//! - Host is stored without its port, which is what domain patterns match
//! - Request ID added as early as possible for tracing

use std::fmt;
use std::str::FromStr;

use axum::body::Bytes;
use axum::http::{request::Parts, HeaderMap, HeaderName, HeaderValue, Method};
use serde::{Deserialize, Serialize};

use crate::acl::CallerAttributes;

/// Header set by the request-id layer.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Header browsers' XHR helpers send; its presence turns a request into AJAX.
pub const X_REQUESTED_WITH: &str = "x-requested-with";

/// Methods a route can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Ajax,
}

impl HttpMethod {
    /// Every method, in the order routes default to.
    pub const ALL: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Ajax,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Ajax => "AJAX",
        }
    }

    /// Case-insensitive parse of a method name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "DELETE" => Some(HttpMethod::Delete),
            "AJAX" => Some(HttpMethod::Ajax),
            _ => None,
        }
    }

    /// Classify a wire request. `HEAD` is served as `GET`; anything else
    /// outside the routable set yields `None`.
    pub fn from_http(method: &Method, headers: &HeaderMap) -> Option<Self> {
        let is_xhr = headers
            .get(X_REQUESTED_WITH)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
            .unwrap_or(false);
        if is_xhr {
            return Some(HttpMethod::Ajax);
        }

        match *method {
            Method::GET | Method::HEAD => Some(HttpMethod::Get),
            Method::POST => Some(HttpMethod::Post),
            Method::PUT => Some(HttpMethod::Put),
            Method::DELETE => Some(HttpMethod::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown HTTP method '{}'", s))
    }
}

/// Returned when a wire request uses a method no route can be bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedMethod(pub Method);

impl fmt::Display for UnsupportedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "method {} is not routable", self.0)
    }
}

impl std::error::Error for UnsupportedMethod {}

/// What routing resolved for this request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchedRoute {
    /// Normalised URL pattern of the route.
    pub pattern: String,
    pub controller: Option<String>,
    pub action: Option<String>,
    pub model: Option<String>,
    /// True when the 404 route answered because nothing else matched.
    pub fallback: bool,
}

/// A request travelling through the dispatcher.
#[derive(Debug, Clone)]
pub struct Request {
    id: String,
    method: HttpMethod,
    host: String,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    principal: CallerAttributes,
    slugs: Vec<String>,
    route: Option<MatchedRoute>,
}

impl Request {
    /// Create a request for `method` and `path` with no host, headers or body.
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            method,
            host: String::new(),
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            principal: CallerAttributes::new(),
            slugs: Vec::new(),
            route: None,
        }
    }

    /// Build from the parts of a wire request.
    ///
    /// The host comes from the `Host` header, falling back to the URI
    /// authority and then to `default_host`.
    pub fn from_http(parts: &Parts, body: Bytes, default_host: &str) -> Result<Self, UnsupportedMethod> {
        let method = HttpMethod::from_http(&parts.method, &parts.headers)
            .ok_or_else(|| UnsupportedMethod(parts.method.clone()))?;

        let host = parts
            .headers
            .get("host")
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
            .or_else(|| parts.uri.authority().map(|a| a.as_str().to_string()))
            .unwrap_or_else(|| default_host.to_string());

        let id = parts
            .headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut request = Self::new(method, parts.uri.path())
            .with_host(host)
            .with_body(body);
        request.id = id;
        request.query = parts.uri.query().map(str::to_string);
        request.headers = parts.headers.clone();
        Ok(request)
    }

    pub fn with_host(mut self, host: impl AsRef<str>) -> Self {
        self.host = strip_port(host.as_ref()).to_string();
        self
    }

    /// Add a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_principal(mut self, principal: CallerAttributes) -> Self {
        self.principal = principal;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as text, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Attributes of the authenticated caller.
    pub fn principal(&self) -> &CallerAttributes {
        &self.principal
    }

    pub fn principal_mut(&mut self) -> &mut CallerAttributes {
        &mut self.principal
    }

    /// Positional slug values, in capture order followed by hard-coded slugs.
    pub fn slugs(&self) -> &[String] {
        &self.slugs
    }

    pub fn slug(&self, index: usize) -> Option<&str> {
        self.slugs.get(index).map(String::as_str)
    }

    pub fn route(&self) -> Option<&MatchedRoute> {
        self.route.as_ref()
    }

    pub(crate) fn set_match(&mut self, route: MatchedRoute, slugs: Vec<String>) {
        self.route = Some(route);
        self.slugs = slugs;
    }
}

/// Drop a `:port` suffix, leaving bracketed IPv6 literals intact.
fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}
