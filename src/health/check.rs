//! Health check descriptors and results.
//!
//! # States
//! - Unknown: registered, never run
//! - Up / Degraded / Disabled: reported by the check itself
//! - Critical / Error: accepted from collaborators, aggregated like degraded / down
//! - Down: the check failed, panicked, or timed out
//!
//! # State Transitions
//! ```text
//! Unknown → (running) → {Up, Down, Degraded, Disabled, ...}
//! Re-evaluated on every invocation; no hysteresis.
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status reported for one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Up,
    Down,
    Degraded,
    Critical,
    Disabled,
    Error,
    Unknown,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Up => "up",
            CheckStatus::Down => "down",
            CheckStatus::Degraded => "degraded",
            CheckStatus::Critical => "critical",
            CheckStatus::Disabled => "disabled",
            CheckStatus::Error => "error",
            CheckStatus::Unknown => "unknown",
        }
    }

    /// Counts towards an `unhealthy` overall status.
    pub fn is_failing(&self) -> bool {
        matches!(self, CheckStatus::Down)
    }

    /// Counts towards a `degraded` overall status.
    pub fn is_impaired(&self) -> bool {
        matches!(self, CheckStatus::Degraded | CheckStatus::Critical)
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a check function hands back on success.
///
/// `status` defaults to `up`; `details` are surfaced verbatim in the report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckOutcome {
    pub status: Option<CheckStatus>,
    pub details: Map<String, Value>,
}

impl CheckOutcome {
    pub fn up() -> Self {
        Self::with_status(CheckStatus::Up)
    }

    pub fn degraded() -> Self {
        Self::with_status(CheckStatus::Degraded)
    }

    pub fn with_status(status: CheckStatus) -> Self {
        Self {
            status: Some(status),
            details: Map::new(),
        }
    }

    /// Add a detail field.
    pub fn detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Build from any serializable value.
    ///
    /// A top-level `status` string that names a known status becomes the
    /// outcome status; every other field becomes a detail.
    pub fn from_value(value: Value) -> Self {
        let mut details = match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".into(), other);
                map
            }
        };
        let status = details
            .get("status")
            .cloned()
            .and_then(|s| serde_json::from_value::<CheckStatus>(s).ok());
        if status.is_some() {
            details.remove("status");
        }
        Self { status, details }
    }
}

/// Error type check functions may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// What a check function resolves to.
pub type ProbeResult = Result<CheckOutcome, BoxError>;

/// Type-erased zero-argument async check.
pub type CheckFn = Arc<dyn Fn() -> BoxFuture<'static, ProbeResult> + Send + Sync>;

/// Box any async closure into a [`CheckFn`].
pub fn check_fn<F, Fut>(f: F) -> CheckFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ProbeResult> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// A registered check.
#[derive(Clone)]
pub struct HealthCheck {
    pub name: String,
    pub check_fn: CheckFn,
    pub timeout: Duration,
}

impl fmt::Debug for HealthCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthCheck")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Latest result of one check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    #[serde(skip)]
    pub name: String,
    pub status: CheckStatus,
    pub last_check: DateTime<Utc>,
    #[serde(rename = "response_time")]
    pub response_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    /// Result for a check that failed before producing an outcome.
    pub fn failed(name: &str, status: CheckStatus, error: impl Into<String>, response_time_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            status,
            last_check: Utc::now(),
            response_time_ms,
            details: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_from_value() {
        let outcome = CheckOutcome::from_value(json!({"status": "disabled", "message": "no key"}));
        assert_eq!(outcome.status, Some(CheckStatus::Disabled));
        assert_eq!(outcome.details.get("message"), Some(&json!("no key")));
        assert!(!outcome.details.contains_key("status"));

        // Unknown status strings stay as details.
        let outcome = CheckOutcome::from_value(json!({"status": "sleepy"}));
        assert_eq!(outcome.status, None);
        assert_eq!(outcome.details.get("status"), Some(&json!("sleepy")));
    }

    #[test]
    fn test_status_classes() {
        assert!(CheckStatus::Down.is_failing());
        assert!(!CheckStatus::Error.is_failing());
        assert!(!CheckStatus::Error.is_impaired());
        assert!(CheckStatus::Critical.is_impaired());
        assert!(!CheckStatus::Disabled.is_failing());
        assert!(!CheckStatus::Disabled.is_impaired());
    }

    #[test]
    fn test_result_json_shape() {
        let result = CheckResult::failed("db", CheckStatus::Down, "boom", 12);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], json!("down"));
        assert_eq!(value["response_time"], json!(12));
        assert_eq!(value["error"], json!("boom"));
        assert!(value.get("details").is_none());
        assert!(value.get("name").is_none());
    }
}
