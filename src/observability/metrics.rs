//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define shutdown metrics (runs, phase latency, close failures)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `shutdown_runs_total` (counter): completed shutdown runs by outcome
//! - `shutdown_phase_duration_seconds` (histogram): time spent per phase
//! - `shutdown_close_failures_total` (counter): failed or timed-out closes by participant kind
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Labels are static strings, so cardinality stays fixed

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::lifecycle::participant::ParticipantKind;

/// Start the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record the end of a shutdown run.
pub fn record_shutdown(succeeded: bool) {
    let outcome = if succeeded { "success" } else { "error" };
    metrics::counter!("shutdown_runs_total", "outcome" => outcome).increment(1);
}

/// Record how long a phase took, measured from `started`.
pub fn record_phase(phase: &'static str, started: Instant) {
    metrics::histogram!("shutdown_phase_duration_seconds", "phase" => phase)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_close_failure(kind: ParticipantKind) {
    metrics::counter!("shutdown_close_failures_total", "kind" => kind.as_str()).increment(1);
}
