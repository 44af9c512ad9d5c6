//! Metrics collection and exposition.
//!
//! # Metrics
//! - `balancer_requests_total` (counter): requests by method, status, backend
//! - `balancer_request_duration_seconds` (histogram): forwarding latency per backend
//! - `balancer_backend_health` (gauge): 1=healthy, 0=unhealthy
//! - `balancer_backend_weight` (gauge): current routing weight
//! - `balancer_probe_duration_seconds` (histogram): probe latency by outcome
//! - `balancer_routing_errors_total` (counter): routing failures by kind
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, backend_id: &str, started: Instant) {
    counter!(
        "balancer_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "backend" => backend_id.to_string()
    )
    .increment(1);
    histogram!("balancer_request_duration_seconds", "backend" => backend_id.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_probe(backend_id: &str, ok: bool, started: Instant) {
    let outcome = if ok { "success" } else { "failure" };
    histogram!(
        "balancer_probe_duration_seconds",
        "backend" => backend_id.to_string(),
        "outcome" => outcome
    )
    .record(started.elapsed().as_secs_f64());
}

pub fn record_backend_health(backend_id: &str, healthy: bool) {
    gauge!("balancer_backend_health", "backend" => backend_id.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_backend_weight(backend_id: &str, weight: f64) {
    gauge!("balancer_backend_weight", "backend" => backend_id.to_string()).set(weight);
}

pub fn record_routing_error(kind: &'static str) {
    counter!("balancer_routing_errors_total", "kind" => kind).increment(1);
}
