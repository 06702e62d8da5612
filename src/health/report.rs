//! Aggregated health reports.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::health::check::{CheckResult, CheckStatus};
use crate::health::system::SystemInfo;
use crate::observability::MetricsSnapshot;

/// System-wide status derived from every check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl OverallStatus {
    /// Any failing status wins, then any impaired one; otherwise healthy.
    pub fn aggregate<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = CheckStatus>,
    {
        let mut overall = OverallStatus::Healthy;
        for status in statuses {
            if status.is_failing() {
                return OverallStatus::Unhealthy;
            }
            if status.is_impaired() {
                overall = OverallStatus::Degraded;
            }
        }
        overall
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Healthy => "healthy",
            OverallStatus::Degraded => "degraded",
            OverallStatus::Unhealthy => "unhealthy",
        }
    }
}

/// Result of one `run_all` pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub overall_status: OverallStatus,
    pub timestamp: DateTime<Utc>,
    pub uptime: String,
    #[serde(rename = "total_check_time")]
    pub total_check_time_ms: u64,
    pub checks: BTreeMap<String, CheckResult>,
    pub metrics: MetricsSnapshot,
    pub system_info: SystemInfo,
}

impl HealthReport {
    pub fn count(&self, status: CheckStatus) -> usize {
        self.checks.values().filter(|r| r.status == status).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
}

/// Last known state of one check, without running it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckSummary {
    pub status: CheckStatus,
    pub last_check: Option<DateTime<Utc>>,
    pub response_time: Option<u64>,
}

/// Cheap dashboard view built from cached results and metric thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSummary {
    pub status: OverallStatus,
    pub timestamp: DateTime<Utc>,
    pub uptime: String,
    pub checks: BTreeMap<String, CheckSummary>,
    pub alerts: Vec<Alert>,
    pub metrics: MetricsSnapshot,
}
