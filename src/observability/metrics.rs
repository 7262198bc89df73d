//! Metrics collection and exposition.
//!
//! # Metrics
//! - `staking_steps_total` (counter): finished steps by operation, status
//! - `staking_retries_total` (counter): retried calls by call site
//! - `staking_confirmation_seconds` (histogram): broadcast-to-terminal latency by operation
//! - `staking_recovered_total` (counter): stuck-fund imports by destination chain
//!
//! Recording is a no-op until [`init_metrics`] installs the Prometheus recorder.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

pub fn record_step_outcome(operation: &str, status: &str) {
    counter!(
        "staking_steps_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_retry(call_site: &'static str) {
    counter!("staking_retries_total", "call_site" => call_site).increment(1);
}

pub fn record_confirmation_latency(operation: &str, started: Instant) {
    histogram!(
        "staking_confirmation_seconds",
        "operation" => operation.to_string()
    )
    .record(started.elapsed().as_secs_f64());
}

pub fn record_recovery(chain: &str) {
    counter!("staking_recovered_total", "chain" => chain.to_string()).increment(1);
}

/// Install the Prometheus recorder and its HTTP scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}
