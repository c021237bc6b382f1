//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: one catch-all route feeding the dispatcher
//! - Wire up middleware (request ID, tracing, timeout, panic recovery)
//! - Convert wire requests into pipeline requests and back
//! - Map escaped pipeline errors to status codes
//! - Serve until the shutdown future completes

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use http_body_util::LengthLimitError;
use tokio::net::TcpListener;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::error::Error;
use crate::http::request::Request;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub default_host: Arc<str>,
    pub max_body_bytes: usize,
}

/// HTTP server hosting the dispatcher.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(dispatcher: Arc<Dispatcher>, config: &ServerConfig) -> Self {
        let state = AppState {
            dispatcher,
            default_host: Arc::from(config.default_host.as_str()),
            max_body_bytes: config.max_body_bytes,
        };
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(dispatch_handler))
            .route("/", any(dispatch_handler))
            .with_state(state)
            .layer(CatchPanicLayer::new())
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for embedding or driving without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` completes, then drain.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn dispatch_handler(State(state): State<AppState>, request: axum::extract::Request) -> Response {
    let (parts, body) = request.into_parts();

    let bytes = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, path = %parts.uri.path(), "Failed to read request body");
            return body_error_response(&e);
        }
    };

    let req = match Request::from_http(&parts, bytes, &state.default_host) {
        Ok(req) => req,
        Err(e) => {
            tracing::debug!(error = %e, path = %parts.uri.path(), "Rejected request method");
            return (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed").into_response();
        }
    };
    let request_id = req.id().to_string();

    let mut response = match state.dispatcher.dispatch(req) {
        Ok(res) => res.into_response(),
        Err(e) => error_response(&request_id, e),
    };

    if parts.method == Method::HEAD {
        *response.body_mut() = Body::empty();
    }
    response
}

/// 413 when the body hit the size limit, 400 for any other read failure.
fn body_error_response(error: &axum::Error) -> Response {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
        source = e.source();
    }
    (StatusCode::BAD_REQUEST, "Bad Request").into_response()
}

fn error_response(request_id: &str, error: Error) -> Response {
    let status = error.status();
    match &error {
        Error::RouteNotFound { .. } => {
            tracing::debug!(request_id, error = %error, "No route matched");
            (status, "Not Found").into_response()
        }
        _ => {
            tracing::error!(request_id, error = %error, "Request failed");
            (status, "Internal Server Error").into_response()
        }
    }
}
