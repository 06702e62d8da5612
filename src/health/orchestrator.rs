//! Health check registry and runner.
//!
//! # Responsibilities
//! - Keep named checks and the latest result of each
//! - Run one check, or all of them concurrently, each under its own timeout
//! - Aggregate results into a report or a cheap summary
//!
//! # Design Decisions
//! - Every check runs in its own task; a panic, error, or hang stays in that task
//! - A check that loses the race against its timeout is aborted
//! - `run_all` collects results first and writes them back in one pass

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::task::JoinError;
use tokio::time::{self, Instant};

use crate::health::check::{check_fn, CheckResult, CheckStatus, HealthCheck, ProbeResult};
use crate::health::report::{Alert, AlertLevel, CheckSummary, HealthReport, HealthSummary, OverallStatus};
use crate::health::system::SystemInfo;
use crate::observability::recorder::format_uptime;
use crate::observability::{metrics, MetricsRecorder};

/// Timeout applied when a check is registered without one.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_millis(5000);

/// Thresholds that raise alerts in [`HealthOrchestrator::summary`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    /// Error rate, in percent, above which an alert is raised.
    pub error_rate_percent: f64,
    pub blocked_requests: u64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            error_rate_percent: 5.0,
            blocked_requests: 100,
        }
    }
}

/// Registry of named checks plus their latest results.
pub struct HealthOrchestrator {
    checks: Mutex<HashMap<String, HealthCheck>>,
    results: Mutex<HashMap<String, CheckResult>>,
    default_timeout: Duration,
    alerts: AlertThresholds,
    metrics: Arc<MetricsRecorder>,
}

impl HealthOrchestrator {
    pub fn new(metrics: Arc<MetricsRecorder>) -> Self {
        Self {
            checks: Mutex::new(HashMap::new()),
            results: Mutex::new(HashMap::new()),
            default_timeout: DEFAULT_CHECK_TIMEOUT,
            alerts: AlertThresholds::default(),
            metrics,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_alert_thresholds(mut self, alerts: AlertThresholds) -> Self {
        self.alerts = alerts;
        self
    }

    /// Register `f` under `name`. A later registration with the same name replaces it.
    pub fn register<F, Fut>(&self, name: impl Into<String>, f: F, timeout: Option<Duration>)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProbeResult> + Send + 'static,
    {
        let name = name.into();
        let check = HealthCheck {
            name: name.clone(),
            check_fn: check_fn(f),
            timeout: timeout.unwrap_or(self.default_timeout),
        };
        tracing::debug!(name = %name, timeout_ms = check.timeout.as_millis() as u64, "Health check registered");

        self.checks
            .lock()
            .expect("health registry mutex poisoned")
            .insert(name.clone(), check);
        self.results
            .lock()
            .expect("health results mutex poisoned")
            .remove(&name);
    }

    /// Names of every registered check, sorted.
    pub fn check_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .checks
            .lock()
            .expect("health registry mutex poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Latest stored result for `name`, if it has run.
    pub fn last_result(&self, name: &str) -> Option<CheckResult> {
        self.results
            .lock()
            .expect("health results mutex poisoned")
            .get(name)
            .cloned()
    }

    /// Run one check and store its result. Never fails.
    pub async fn run_check(&self, name: &str) -> CheckResult {
        let check = self
            .checks
            .lock()
            .expect("health registry mutex poisoned")
            .get(name)
            .cloned();

        let Some(check) = check else {
            tracing::warn!(name = %name, "Health check not registered");
            return CheckResult::failed(
                name,
                CheckStatus::Error,
                format!("Health check '{}' not found", name),
                0,
            );
        };

        let result = execute(&check).await;
        self.results
            .lock()
            .expect("health results mutex poisoned")
            .insert(name.to_string(), result.clone());
        result
    }

    /// Run every registered check concurrently and aggregate the results.
    pub async fn run_all(&self) -> HealthReport {
        let checks: Vec<HealthCheck> = self
            .checks
            .lock()
            .expect("health registry mutex poisoned")
            .values()
            .cloned()
            .collect();

        let started = Instant::now();
        let results = join_all(checks.iter().map(execute)).await;
        let total_check_time_ms = started.elapsed().as_millis() as u64;

        {
            let mut stored = self.results.lock().expect("health results mutex poisoned");
            for result in &results {
                stored.insert(result.name.clone(), result.clone());
            }
        }

        let checks: BTreeMap<String, CheckResult> = results
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();
        let overall_status = OverallStatus::aggregate(checks.values().map(|r| r.status));

        tracing::info!(
            overall = overall_status.as_str(),
            checks = checks.len(),
            total_check_time_ms,
            "Health checks completed"
        );

        HealthReport {
            overall_status,
            timestamp: Utc::now(),
            uptime: format_uptime(self.metrics.uptime()),
            total_check_time_ms,
            checks,
            metrics: self.metrics.snapshot(),
            system_info: SystemInfo::collect(self.metrics.uptime()),
        }
    }

    /// Summary from stored results and metric thresholds. Runs no checks.
    pub fn summary(&self) -> HealthSummary {
        let names = self.check_names();
        let checks: BTreeMap<String, CheckSummary> = {
            let stored = self.results.lock().expect("health results mutex poisoned");
            names
                .into_iter()
                .map(|name| {
                    let summary = match stored.get(&name) {
                        Some(r) => CheckSummary {
                            status: r.status,
                            last_check: Some(r.last_check),
                            response_time: Some(r.response_time_ms),
                        },
                        None => CheckSummary {
                            status: CheckStatus::Unknown,
                            last_check: None,
                            response_time: None,
                        },
                    };
                    (name, summary)
                })
                .collect()
        };

        let metrics = self.metrics.snapshot();
        let mut alerts = Vec::new();
        let error_rate_percent = metrics.error_ratio() * 100.0;
        if error_rate_percent > self.alerts.error_rate_percent {
            alerts.push(Alert {
                level: AlertLevel::Warning,
                message: format!("High error rate: {}", metrics.performance.error_rate),
            });
        }
        if metrics.security.blocked_requests > self.alerts.blocked_requests {
            alerts.push(Alert {
                level: AlertLevel::Warning,
                message: format!(
                    "High number of blocked requests: {}",
                    metrics.security.blocked_requests
                ),
            });
        }

        let status = match OverallStatus::aggregate(checks.values().map(|c| c.status)) {
            OverallStatus::Healthy if !alerts.is_empty() => OverallStatus::Degraded,
            other => other,
        };

        HealthSummary {
            status,
            timestamp: Utc::now(),
            uptime: metrics.uptime.clone(),
            checks,
            alerts,
            metrics,
        }
    }
}

/// Run `check` in its own task, racing its timeout.
async fn execute(check: &HealthCheck) -> CheckResult {
    let started = Instant::now();
    let probe = check.check_fn.clone();
    let mut handle = tokio::spawn(async move { probe().await });

    let raced = time::timeout(check.timeout, &mut handle).await;
    let response_time_ms = started.elapsed().as_millis() as u64;

    let result = match raced {
        Ok(Ok(Ok(outcome))) => CheckResult {
            name: check.name.clone(),
            status: outcome.status.unwrap_or(CheckStatus::Up),
            last_check: Utc::now(),
            response_time_ms,
            details: Some(outcome.details),
            error: None,
        },
        Ok(Ok(Err(e))) => CheckResult::failed(&check.name, CheckStatus::Down, e.to_string(), response_time_ms),
        Ok(Err(join_error)) => CheckResult::failed(
            &check.name,
            CheckStatus::Down,
            describe_join_error(join_error),
            response_time_ms,
        ),
        Err(_) => {
            handle.abort();
            CheckResult::failed(&check.name, CheckStatus::Down, "Health check timeout", response_time_ms)
        }
    };

    match &result.error {
        None => tracing::info!(
            name = %check.name,
            status = %result.status,
            response_time_ms,
            "Health check completed"
        ),
        Some(error) => tracing::warn!(
            name = %check.name,
            status = %result.status,
            response_time_ms,
            error = %error,
            "Health check failed"
        ),
    }
    metrics::record_health_check(&check.name, result.status == CheckStatus::Up);

    result
}

fn describe_join_error(error: JoinError) -> String {
    if !error.is_panic() {
        return "Health check cancelled".to_string();
    }
    let payload = error.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("Health check panicked: {}", message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::check::{BoxError, CheckOutcome};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    async fn explode() -> ProbeResult {
        panic!("kaboom")
    }

    fn orchestrator() -> HealthOrchestrator {
        HealthOrchestrator::new(Arc::new(MetricsRecorder::default()))
    }

    #[tokio::test]
    async fn test_probe_up_and_flaky_down_is_unhealthy() {
        let health = orchestrator();
        health.register(
            "cacheProbe",
            || async { Ok(CheckOutcome::up().detail("latency_ms", 1)) },
            None,
        );
        health.register(
            "flaky",
            || async { Err::<CheckOutcome, BoxError>("boom".into()) },
            None,
        );

        let report = health.run_all().await;
        assert_eq!(report.overall_status, OverallStatus::Unhealthy);
        assert_eq!(report.checks.len(), 2);
        assert_eq!(report.checks["cacheProbe"].status, CheckStatus::Up);
        assert_eq!(report.checks["flaky"].status, CheckStatus::Down);
        assert_eq!(report.checks["flaky"].error.as_deref(), Some("boom"));
        assert!(report.checks["flaky"].details.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_down_and_aborts() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        let health = orchestrator();
        health.register(
            "hang",
            move || {
                let flag = flag.clone();
                async move {
                    time::sleep(Duration::from_secs(60)).await;
                    flag.store(true, Ordering::SeqCst);
                    Ok(CheckOutcome::up())
                }
            },
            Some(Duration::from_millis(50)),
        );

        let result = health.run_check("hang").await;
        assert_eq!(result.status, CheckStatus::Down);
        assert_eq!(result.error.as_deref(), Some("Health check timeout"));
        assert!(result.response_time_ms >= 50);

        time::sleep(Duration::from_secs(120)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_panicking_check_is_isolated() {
        let health = orchestrator();
        health.register("panics", explode, None);
        health.register("fine", || async { Ok(CheckOutcome::up()) }, None);

        let report = health.run_all().await;
        assert_eq!(report.checks["fine"].status, CheckStatus::Up);
        assert_eq!(report.checks["panics"].status, CheckStatus::Down);
        assert!(report.checks["panics"]
            .error
            .as_deref()
            .unwrap()
            .contains("kaboom"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_checks_run_concurrently() {
        let health = orchestrator();
        for name in ["a", "b", "c"] {
            health.register(
                name,
                || async {
                    time::sleep(Duration::from_millis(100)).await;
                    Ok(CheckOutcome::up())
                },
                None,
            );
        }

        let report = health.run_all().await;
        assert_eq!(report.overall_status, OverallStatus::Healthy);
        assert!(report.total_check_time_ms < 300);
    }

    #[tokio::test]
    async fn test_error_status_does_not_fail_report() {
        let health = orchestrator();
        health.register("a", || async { Ok(CheckOutcome::up()) }, None);
        health.register(
            "cache",
            || async { Ok(CheckOutcome::with_status(CheckStatus::Error)) },
            None,
        );

        let report = health.run_all().await;
        assert_eq!(report.checks["cache"].status, CheckStatus::Error);
        assert_eq!(report.overall_status, OverallStatus::Healthy);
    }

    #[tokio::test]
    async fn test_unknown_check_name() {
        let health = orchestrator();
        let result = health.run_check("missing").await;
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.error.as_deref(), Some("Health check 'missing' not found"));
        assert!(health.last_result("missing").is_none());
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let health = orchestrator();
        health.register("svc", || async { Ok(CheckOutcome::degraded()) }, None);
        health.register("svc", || async { Ok(CheckOutcome::up()) }, None);

        let report = health.run_all().await;
        assert_eq!(report.checks.len(), 1);
        assert_eq!(report.checks["svc"].status, CheckStatus::Up);
    }

    #[tokio::test]
    async fn test_results_are_overwritten_each_run() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let health = orchestrator();
        health.register(
            "alternating",
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n % 2 == 0 {
                        Ok(CheckOutcome::up())
                    } else {
                        Err::<CheckOutcome, BoxError>("odd".into())
                    }
                }
            },
            None,
        );

        assert_eq!(health.run_check("alternating").await.status, CheckStatus::Up);
        assert_eq!(health.run_check("alternating").await.status, CheckStatus::Down);
        assert_eq!(
            health.last_result("alternating").map(|r| r.status),
            Some(CheckStatus::Down)
        );
    }

    #[tokio::test]
    async fn test_summary_alerts_degrade_status() {
        let metrics = Arc::new(MetricsRecorder::default());
        let health = HealthOrchestrator::new(metrics.clone());
        health.register("svc", || async { Ok(CheckOutcome::up()) }, None);
        health.run_all().await;

        assert_eq!(health.summary().status, OverallStatus::Healthy);

        for _ in 0..9 {
            metrics.record_request(true, 10, false);
        }
        metrics.record_request(false, 10, false);

        let summary = health.summary();
        assert_eq!(summary.status, OverallStatus::Degraded);
        assert_eq!(summary.alerts.len(), 1);
        assert_eq!(summary.alerts[0].message, "High error rate: 10.00%");
    }

    #[tokio::test]
    async fn test_summary_lists_unrun_checks_as_unknown() {
        let health = orchestrator();
        health.register("never", || async { Ok(CheckOutcome::up()) }, None);
        let summary = health.summary();
        assert_eq!(summary.checks["never"].status, CheckStatus::Unknown);
        assert!(summary.checks["never"].last_check.is_none());
    }
}
