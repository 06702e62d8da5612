//! Metrics exposition through the `metrics` facade.
//!
//! # Metrics
//! - `scout_requests_total` (counter): requests by outcome
//! - `scout_request_duration_seconds` (histogram): latency distribution
//! - `scout_rate_limited_total` (counter): rejected admissions by limiter
//! - `scout_security_events_total` (counter): blocked/suspicious/failed_auth
//! - `scout_health_check_up` (gauge): 1=up, 0=anything else, per check
//! - `scout_cache_operations_total` (counter): cache ops by kind and result
//!
//! The in-process `MetricsRecorder` is the source of truth for the JSON
//! snapshot; these mirrors exist for Prometheus scraping.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install Prometheus exporter"),
    }
}

pub fn record_request(outcome: &'static str, elapsed: Duration) {
    counter!("scout_requests_total", "outcome" => outcome).increment(1);
    histogram!("scout_request_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_rate_limited(limiter: &'static str) {
    counter!("scout_rate_limited_total", "limiter" => limiter).increment(1);
}

pub fn record_security_event(kind: &'static str) {
    counter!("scout_security_events_total", "kind" => kind).increment(1);
}

pub fn record_health_check(name: &str, up: bool) {
    gauge!("scout_health_check_up", "check" => name.to_string()).set(if up { 1.0 } else { 0.0 });
}

pub fn record_cache_op(op: &'static str, result: &'static str) {
    counter!("scout_cache_operations_total", "op" => op, "result" => result).increment(1);
}

pub fn record_rate_limit_keys(count: usize) {
    gauge!("scout_rate_limit_keys").set(count as f64);
}
