//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Record aggregate request metrics after each dispatched request
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `http_interceptor_requests_total` (counter): requests by status
//! - `http_interceptor_request_duration_seconds` (histogram): handler latency
//!
//! # Design Decisions
//! - Route URLs are not labels; per-route counts live in the dispatcher's
//!   counter table and are served by the diagnostic route
//! - Recording is a no-op until an exporter is installed

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one completed request.
pub fn record_request(status: u16, elapsed: Duration) {
    counter!("http_interceptor_requests_total", "status" => status.to_string()).increment(1);
    histogram!("http_interceptor_request_duration_seconds").record(elapsed.as_secs_f64());
}
