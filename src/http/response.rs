//! Response handling and transformation.
//!
//! # Responsibilities
//! - Carry status, headers and body shared by middleware and the handler
//! - Record the pipeline outcome as an explicit [`ResponseState`]
//! - Convert into an axum response at the server boundary
//!
//! # Design Decisions
//! - Middleware signal a halt by mutating the response, never by returning
//! - `Denied` is terminal: later redirects or denials do not change it
//! - Handlers and middleware see the same response object

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use serde::Serialize;

/// Outcome flag the middleware chain inspects after every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ResponseState {
    #[default]
    Continue,
    Denied,
    Redirected,
}

impl ResponseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseState::Continue => "continue",
            ResponseState::Denied => "denied",
            ResponseState::Redirected => "redirected",
        }
    }
}

/// Response under construction for one request.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    state: ResponseState,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            state: ResponseState::Continue,
        }
    }

    pub fn with_status(status: StatusCode) -> Self {
        let mut response = Self::new();
        response.status = status;
        response
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Set a header, replacing any previous value. Invalid names or values
    /// are dropped with a warning.
    pub fn set_header(&mut self, name: &str, value: &str) {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Dropping invalid response header"),
        }
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Plain-text body with a matching content type.
    pub fn set_text(&mut self, body: impl Into<String>) {
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        self.body = Bytes::from(body.into());
    }

    /// JSON body with a matching content type.
    pub fn set_json<T: Serialize>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = Bytes::from(body);
        Ok(())
    }

    pub fn state(&self) -> ResponseState {
        self.state
    }

    /// True once a middleware has denied or redirected.
    pub fn is_halted(&self) -> bool {
        self.state != ResponseState::Continue
    }

    /// Start over with `status`, keeping headers that do not describe the
    /// old body.
    pub fn restart(&mut self, status: StatusCode) {
        self.headers.remove(header::CONTENT_TYPE);
        self.headers.remove(header::LOCATION);
        self.status = status;
        self.body = Bytes::new();
        self.state = ResponseState::Continue;
    }

    /// Deny the request. Overrides any earlier status, body or redirect.
    pub fn deny(&mut self, status: StatusCode, body: impl Into<String>) {
        if self.state == ResponseState::Denied {
            return;
        }
        self.headers.remove(header::LOCATION);
        self.status = status;
        self.set_text(body);
        self.state = ResponseState::Denied;
    }

    /// Redirect to `location` with 302. Ignored once denied.
    pub fn redirect(&mut self, location: &str) {
        self.redirect_with(StatusCode::FOUND, location);
    }

    pub fn redirect_with(&mut self, status: StatusCode, location: &str) {
        if self.state == ResponseState::Denied {
            return;
        }
        self.status = status;
        self.set_header(header::LOCATION.as_str(), location);
        self.body = Bytes::new();
        self.state = ResponseState::Redirected;
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let mut response = axum::response::Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
