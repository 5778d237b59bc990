//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): relay operations by method, status, outcome
//! - `relay_request_duration_seconds` (histogram): time until the operation ends
//! - `relay_bytes_relayed_total` (counter): response body bytes sent to callers
//! - `relay_redirects_rewritten_total` (counter): self-referencing redirects issued
//! - `relay_errors_total` (counter): failures by error kind
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder (tests, metrics disabled) every call is a no-op
//! - Status 0 marks failures after headers were committed

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, outcome: &'static str, start: Instant) {
    counter!(
        "relay_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("relay_request_duration_seconds", "outcome" => outcome).record(start.elapsed().as_secs_f64());
}

pub fn record_relayed_bytes(bytes: u64) {
    counter!("relay_bytes_relayed_total").increment(bytes);
}

pub fn record_redirect_rewritten() {
    counter!("relay_redirects_rewritten_total").increment(1);
}

pub fn record_relay_error(kind: &'static str) {
    counter!("relay_errors_total", "kind" => kind).increment(1);
}
