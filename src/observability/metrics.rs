//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_http_requests_total` (counter): requests by route, status
//! - `gateway_http_request_duration_seconds` (histogram): latency by route
//! - `gateway_pipeline_items_total` (counter): items by kind
//! - `gateway_statements_total` (counter): statements by outcome
//! - `gateway_statement_duration_seconds` (histogram): statement latency
//! - `gateway_auth_failures_total` (counter): rejected bearer tokens
//!
//! Recording without an installed exporter is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with its own HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(route: &str, status: u16, start: Instant) {
    metrics::counter!(
        "gateway_http_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_http_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_pipeline_item(kind: &'static str) {
    metrics::counter!("gateway_pipeline_items_total", "kind" => kind).increment(1);
}

pub fn record_statement(outcome: &'static str, start: Instant) {
    metrics::counter!("gateway_statements_total", "outcome" => outcome).increment(1);
    metrics::histogram!("gateway_statement_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_auth_failure() {
    metrics::counter!("gateway_auth_failures_total").increment(1);
}
