//! doorpad request pipeline.
//!
//! Routing, middleware and access control for the doorpad visitor kiosk.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ dispatch::Dispatcher
//!                                          │
//!                                          ├─▶ routing   (host → table, method + path → route, slugs)
//!                                          ├─▶ middleware (globals, then route's own; deny/redirect halts)
//!                                          ├─▶ acl       (first matching rule wins, default deny)
//!                                          └─▶ handler   (controller@action or inline; 500 route on error)
//!     Client Response
//!     ◀────────────── http::response ◀─────┘
//!
//!     Cross-cutting: config, lifecycle (startup/shutdown), observability, security
//! ```
//!
//! Everything the dispatcher reads is built once by [`lifecycle::bootstrap`]
//! and never mutated afterwards; the per-request state lives on
//! [`http::Request`] and [`http::Response`].

// Core pipeline
pub mod acl;
pub mod dispatch;
pub mod http;
pub mod middleware;
pub mod routing;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::DoorpadConfig;
pub use dispatch::Dispatcher;
pub use error::Error;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
