//! Metrics collection and exposition.
//!
//! # Metrics
//! - `functions_invocations_total` (counter): invocations by route, outcome
//! - `functions_invocation_duration_seconds` (histogram): handler latency
//! - `functions_builds_total` (counter): compile cycles by outcome
//! - `functions_registry_size` (gauge): functions in the current generation
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is opt-in via `observability.metrics_enabled`

use std::net::SocketAddr;
use std::time::Duration;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_invocation(route: &str, outcome: &'static str, elapsed: Duration) {
    metrics::counter!("functions_invocations_total", "route" => route.to_string(), "outcome" => outcome).increment(1);
    metrics::histogram!("functions_invocation_duration_seconds", "route" => route.to_string()).record(elapsed.as_secs_f64());
}

pub fn record_build(outcome: &'static str) {
    metrics::counter!("functions_builds_total", "outcome" => outcome).increment(1);
}

pub fn record_registry_size(size: usize) {
    metrics::gauge!("functions_registry_size").set(size as f64);
}
