//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by probe and status
//! - `gateway_tokens_issued_total` (counter): tokens handed out
//!
//! # Design Decisions
//! - Low-overhead updates via the `metrics` facade; recording is a no-op
//!   until an exporter is installed
//! - Prometheus exposition on a separate listener, off the serving path

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on its own listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(error) => tracing::error!(%error, "Failed to install metrics exporter"),
    }
}

/// Record a completed request with the probe that handled it.
pub fn record_request(route: &'static str, status: u16) {
    metrics::counter!(
        "gateway_requests_total",
        "route" => route,
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a token issue.
pub fn record_token_issued() {
    metrics::counter!("gateway_tokens_issued_total").increment(1);
}
