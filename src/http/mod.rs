//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout)
//!     → request.rs (method classification, host, body → Request)
//!     → [dispatcher: routing, middleware, ACL, handler]
//!     → response.rs (state, status, headers → axum response)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{HttpMethod, MatchedRoute, Request, UnsupportedMethod, X_REQUESTED_WITH, X_REQUEST_ID};
pub use response::{Response, ResponseState};
pub use server::{AppState, HttpServer};
