//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the resilience core.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration for the resilience core.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CoreConfig {
    /// HTTP surface settings (bind address, limits).
    pub server: ServerConfig,

    /// Cache backing store and TTL policies.
    pub cache: CacheConfig,

    /// Health check settings.
    pub health: HealthConfig,

    /// Sliding-window rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Request metrics recorder settings.
    pub metrics: MetricsConfig,

    /// Logging and exporter settings.
    pub observability: ObservabilityConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum accepted request body in bytes.
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            body_limit_bytes: 1024 * 1024,
        }
    }
}

/// Which backing store the cache talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    Redis,
    Memory,
}

/// Cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Backing store implementation.
    pub backend: CacheBackendKind,

    /// Redis host.
    pub host: String,

    /// Redis port.
    pub port: u16,

    /// Optional Redis password.
    pub password: Option<String>,

    /// Redis logical database index.
    pub db: i64,

    /// Prefix shared by every key this process writes.
    pub namespace: String,

    /// Interval between reconnect attempts while disconnected, in seconds.
    pub reconnect_interval_secs: u64,

    /// TTL in seconds per cache use-case.
    pub ttl_policies: HashMap<String, u64>,

    /// TTL used when a use-case has no entry in `ttl_policies`.
    pub default_ttl_secs: u64,
}

fn default_ttl_policies() -> HashMap<String, u64> {
    HashMap::from([
        ("entity".to_string(), 300),
        ("github".to_string(), 1800),
        ("analysis".to_string(), 3600),
        ("distributed".to_string(), 120),
        ("batch".to_string(), 600),
    ])
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Redis,
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            db: 0,
            namespace: "subnet-scout".to_string(),
            reconnect_interval_secs: 5,
            ttl_policies: default_ttl_policies(),
            default_ttl_secs: 3600,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Run the periodic health monitor.
    pub periodic_enabled: bool,

    /// Periodic run interval in seconds.
    pub interval_secs: u64,

    /// Timeout applied when a check is registered without one, in milliseconds.
    pub default_timeout_ms: u64,

    /// Directory the filesystem check probes for writability.
    pub writable_dir: String,

    /// Environment variables reported as provider credential checks.
    pub provider_keys: Vec<ProviderKeyCheck>,
}

/// A named check that reports whether an external provider is configured.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderKeyCheck {
    /// Check name in the health report.
    pub name: String,

    /// Environment variable holding the credential.
    pub env_var: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            periodic_enabled: true,
            interval_secs: 60,
            default_timeout_ms: 5000,
            writable_dir: "logs".to_string(),
            provider_keys: vec![
                ProviderKeyCheck {
                    name: "anthropic_api".to_string(),
                    env_var: "ANTHROPIC_API_KEY".to_string(),
                },
                ProviderKeyCheck {
                    name: "ionet_api".to_string(),
                    env_var: "IONET_API_KEY".to_string(),
                },
                ProviderKeyCheck {
                    name: "github_api".to_string(),
                    env_var: "GITHUB_TOKEN".to_string(),
                },
            ],
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable the ingress rate limiter.
    pub enabled: bool,

    /// Requests admitted per window per client.
    pub limit: usize,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Stricter limit for compute-heavy request kinds.
    pub compute_limit: usize,

    /// Window for the compute-heavy limit in milliseconds.
    pub compute_window_ms: u64,

    /// Upper bound on tracked keys before an eager sweep.
    pub max_keys: usize,

    /// Interval of the background sweep in seconds.
    pub sweep_interval_secs: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn compute_window(&self) -> Duration {
        Duration::from_millis(self.compute_window_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: 100,
            window_ms: 60_000,
            compute_limit: 20,
            compute_window_ms: 300_000,
            max_keys: 100_000,
            sweep_interval_secs: 60,
        }
    }
}

/// Metrics recorder configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Number of recent response times kept for average/p95.
    pub response_buffer_capacity: usize,

    /// Error rate (percent) above which the summary raises an alert.
    pub error_rate_alert_percent: f64,

    /// Blocked request count above which the summary raises an alert.
    pub blocked_requests_alert: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            response_buffer_capacity: 1000,
            error_rate_alert_percent: 5.0,
            blocked_requests_alert: 100,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Prometheus exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
