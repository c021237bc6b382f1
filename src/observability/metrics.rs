//! Metrics collection and exposition.
//!
//! # Metrics
//! - `doorpad_requests_total` (counter): requests by method, status, route
//! - `doorpad_request_duration_seconds` (histogram): dispatch latency
//! - `doorpad_pipeline_halts_total` (counter): requests stopped early, by
//!   stage (`middleware`, `acl`)
//! - `doorpad_handler_failures_total` (counter): handler errors, by whether
//!   the 500 route recovered them
//!
//! # Design Decisions
//! - Recording is a no-op until [`init_metrics`] installs the exporter
//! - Route label is the URL pattern, never the raw path, to bound cardinality

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, address = %addr, "Failed to install metrics exporter"),
    }
}

/// Record one finished request.
pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    counter!(
        "doorpad_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);
    histogram!("doorpad_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record a request halted before its handler ran.
pub fn record_halt(stage: &'static str) {
    counter!("doorpad_pipeline_halts_total", "stage" => stage).increment(1);
}

/// Record a handler failure.
pub fn record_handler_failure(recovered: bool) {
    counter!(
        "doorpad_handler_failures_total",
        "recovered" => if recovered { "true" } else { "false" }
    )
    .increment(1);
}
