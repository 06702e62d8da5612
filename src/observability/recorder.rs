//! In-process request and security metrics.
//!
//! # Responsibilities
//! - Count requests (total/successful/failed/rate limited)
//! - Count security events (blocked/suspicious/failed auth)
//! - Keep a bounded window of recent response times for average and p95
//!
//! # Design Decisions
//! - One mutex guards counters and the window together so a snapshot is consistent
//! - Average and p95 are recomputed on every record by re-sorting the window;
//!   the window is capped, so the cost is bounded
//! - Every update is mirrored into the `metrics` facade for Prometheus

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::observability::metrics;

/// Default number of response times kept in the window.
pub const DEFAULT_RESPONSE_BUFFER: usize = 1000;

/// Kinds of security events the gate reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEvent {
    Blocked,
    Suspicious,
    FailedAuth,
}

impl SecurityEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEvent::Blocked => "blocked",
            SecurityEvent::Suspicious => "suspicious",
            SecurityEvent::FailedAuth => "failed_auth",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCounters {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub rate_limited: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityCounters {
    pub blocked_requests: u64,
    pub suspicious_activities: u64,
    pub failed_authentications: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    /// Rounded mean of the response time window, in milliseconds.
    pub avg_response_time: u64,
    /// 95th percentile of the response time window, in milliseconds.
    pub p95_response_time: u64,
    /// `failed / total` as a percentage with two decimals.
    pub error_rate: String,
}

/// Process resource usage sampled at snapshot time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Resident memory of this process in MiB.
    pub memory_usage_mb: u64,
    /// System-wide memory in use, percent.
    pub system_memory_percent: f64,
    /// Seconds this process has been running according to the OS.
    pub process_run_time_secs: u64,
}

impl ResourceUsage {
    pub fn sample() -> Self {
        let mut sys = sysinfo::System::new();
        sys.refresh_memory();

        let system_memory_percent = match sys.total_memory() {
            0 => 0.0,
            total => sys.used_memory() as f64 / total as f64 * 100.0,
        };

        let (memory_usage_mb, process_run_time_secs) = sysinfo::get_current_pid()
            .ok()
            .and_then(|pid| {
                sys.refresh_process(pid);
                sys.process(pid)
                    .map(|p| (p.memory() / 1024 / 1024, p.run_time()))
            })
            .unwrap_or_default();

        Self {
            memory_usage_mb,
            system_memory_percent,
            process_run_time_secs,
        }
    }
}

/// Read-only view of the recorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub requests: RequestCounters,
    pub security: SecurityCounters,
    pub performance: PerformanceStats,
    pub resources: ResourceUsage,
    pub timestamp: DateTime<Utc>,
    pub uptime: String,
}

impl MetricsSnapshot {
    /// Error rate as a fraction in `[0, 1]`.
    pub fn error_ratio(&self) -> f64 {
        error_ratio(&self.requests)
    }
}

struct RecorderState {
    requests: RequestCounters,
    security: SecurityCounters,
    response_times: VecDeque<u64>,
    avg_response_time: u64,
    p95_response_time: u64,
}

/// Process-wide request/security metrics with a bounded latency window.
pub struct MetricsRecorder {
    state: Mutex<RecorderState>,
    capacity: usize,
    started_at: Instant,
}

impl MetricsRecorder {
    /// Create a recorder keeping at most `capacity` response times (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(RecorderState {
                requests: RequestCounters::default(),
                security: SecurityCounters::default(),
                response_times: VecDeque::with_capacity(capacity),
                avg_response_time: 0,
                p95_response_time: 0,
            }),
            capacity,
            started_at: Instant::now(),
        }
    }

    /// Record the outcome of one request.
    pub fn record_request(&self, success: bool, response_time_ms: u64, rate_limited: bool) {
        {
            let mut state = self.state.lock().expect("metrics recorder mutex poisoned");
            state.requests.total += 1;
            if success {
                state.requests.successful += 1;
            } else {
                state.requests.failed += 1;
            }
            if rate_limited {
                state.requests.rate_limited += 1;
            }

            if state.response_times.len() == self.capacity {
                state.response_times.pop_front();
            }
            state.response_times.push_back(response_time_ms);

            let (avg, p95) = latency_stats(&state.response_times);
            state.avg_response_time = avg;
            state.p95_response_time = p95;
        }

        let outcome = match (success, rate_limited) {
            (_, true) => "rate_limited",
            (true, false) => "success",
            (false, false) => "failure",
        };
        metrics::record_request(outcome, Duration::from_millis(response_time_ms));
    }

    /// Count a security event.
    pub fn record_security_event(&self, event: SecurityEvent) {
        {
            let mut state = self.state.lock().expect("metrics recorder mutex poisoned");
            match event {
                SecurityEvent::Blocked => state.security.blocked_requests += 1,
                SecurityEvent::Suspicious => state.security.suspicious_activities += 1,
                SecurityEvent::FailedAuth => state.security.failed_authentications += 1,
            }
        }
        tracing::warn!(event = event.as_str(), "Security event recorded");
        metrics::record_security_event(event.as_str());
    }

    /// Snapshot counters, derived statistics, and current resource usage.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let (requests, security, performance) = {
            let state = self.state.lock().expect("metrics recorder mutex poisoned");
            let performance = PerformanceStats {
                avg_response_time: state.avg_response_time,
                p95_response_time: state.p95_response_time,
                error_rate: format!("{:.2}%", error_ratio(&state.requests) * 100.0),
            };
            (state.requests.clone(), state.security.clone(), performance)
        };

        MetricsSnapshot {
            requests,
            security,
            performance,
            resources: ResourceUsage::sample(),
            timestamp: Utc::now(),
            uptime: format_uptime(self.uptime()),
        }
    }

    /// Number of response times currently held in the window.
    pub fn buffered_samples(&self) -> usize {
        self.state
            .lock()
            .expect("metrics recorder mutex poisoned")
            .response_times
            .len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Time since the recorder was created (process start).
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_RESPONSE_BUFFER)
    }
}

fn error_ratio(requests: &RequestCounters) -> f64 {
    if requests.total == 0 {
        return 0.0;
    }
    requests.failed as f64 / requests.total as f64
}

/// Rounded mean and the element at rank `floor(len * 0.95)` of the sorted window.
fn latency_stats(window: &VecDeque<u64>) -> (u64, u64) {
    if window.is_empty() {
        return (0, 0);
    }
    let sum: u64 = window.iter().sum();
    let avg = (sum as f64 / window.len() as f64).round() as u64;

    let mut sorted: Vec<u64> = window.iter().copied().collect();
    sorted.sort_unstable();
    let idx = ((sorted.len() as f64 * 0.95).floor() as usize).min(sorted.len() - 1);
    (avg, sorted[idx])
}

/// Format a duration as `"{d}d {h}h {m}m {s}s"`.
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    format!("{}d {}h {}m {}s", days, hours, minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_rate_and_average() {
        let recorder = MetricsRecorder::default();
        for _ in 0..9 {
            recorder.record_request(true, 120, false);
        }
        recorder.record_request(false, 800, false);

        let snap = recorder.snapshot();
        assert_eq!(snap.requests.total, 10);
        assert_eq!(snap.requests.successful, 9);
        assert_eq!(snap.requests.failed, 1);
        assert_eq!(snap.performance.error_rate, "10.00%");
        assert_eq!(snap.performance.avg_response_time, 188);
        assert_eq!(snap.performance.p95_response_time, 800);
        assert!((snap.error_ratio() - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_recorder_has_zero_error_rate() {
        let snap = MetricsRecorder::default().snapshot();
        assert_eq!(snap.requests.total, 0);
        assert_eq!(snap.performance.error_rate, "0.00%");
        assert_eq!(snap.performance.avg_response_time, 0);
        assert_eq!(snap.error_ratio(), 0.0);
    }

    #[test]
    fn test_window_is_bounded_and_evicts_oldest() {
        let recorder = MetricsRecorder::new(5);
        // Oldest sample is large; once evicted the average must drop.
        recorder.record_request(true, 10_000, false);
        for _ in 0..5 {
            recorder.record_request(true, 10, false);
        }
        assert_eq!(recorder.buffered_samples(), 5);
        let snap = recorder.snapshot();
        assert_eq!(snap.performance.avg_response_time, 10);
        assert_eq!(snap.performance.p95_response_time, 10);
        assert_eq!(snap.requests.total, 6);
    }

    #[test]
    fn test_p95_rank() {
        let recorder = MetricsRecorder::new(100);
        for ms in 1..=100 {
            recorder.record_request(true, ms, false);
        }
        // floor(100 * 0.95) = 95 → the 96th smallest value
        assert_eq!(recorder.snapshot().performance.p95_response_time, 96);
    }

    #[test]
    fn test_rate_limited_and_security_counters() {
        let recorder = MetricsRecorder::default();
        recorder.record_request(false, 1, true);
        recorder.record_security_event(SecurityEvent::Blocked);
        recorder.record_security_event(SecurityEvent::Suspicious);
        recorder.record_security_event(SecurityEvent::Suspicious);
        recorder.record_security_event(SecurityEvent::FailedAuth);

        let snap = recorder.snapshot();
        assert_eq!(snap.requests.rate_limited, 1);
        assert_eq!(snap.security.blocked_requests, 1);
        assert_eq!(snap.security.suspicious_activities, 2);
        assert_eq!(snap.security.failed_authentications, 1);
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0d 0h 0m 0s");
        assert_eq!(
            format_uptime(Duration::from_secs(2 * 86_400 + 3 * 3600 + 4 * 60 + 5)),
            "2d 3h 4m 5s"
        );
    }
}
