//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration and build every subsystem into one `ResilienceCore`
//! - Connect the cache and start background loops
//! - Tear down in reverse on shutdown
//!
//! # Design Decisions
//! - Fail fast: an invalid config or unbuildable cache backend is fatal
//! - An unreachable cache store is not fatal; the service starts fail-open and
//!   the reconnect loop keeps trying
//! - Subsystems are built in dependency order: metrics, cache, health, limiter

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::cache::{CacheError, CacheService};
use crate::config::validation::validate_config;
use crate::config::{ConfigError, CoreConfig};
use crate::health::{register_default_checks, AlertThresholds, HealthMonitor, HealthOrchestrator};
use crate::lifecycle::Shutdown;
use crate::observability::MetricsRecorder;
use crate::security::SlidingWindowLimiter;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cache backend could not be created: {0}")]
    Cache(#[from] CacheError),
}

/// Every piece of process-wide state, shared by `Arc` with request handlers.
pub struct ResilienceCore {
    pub config: CoreConfig,
    pub metrics: Arc<MetricsRecorder>,
    pub cache: Arc<CacheService>,
    pub health: Arc<HealthOrchestrator>,
    pub limiter: Arc<SlidingWindowLimiter>,
}

impl ResilienceCore {
    /// Build all subsystems and register the default health checks. Does no I/O.
    pub fn build(config: CoreConfig) -> Result<Self, StartupError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let metrics = Arc::new(MetricsRecorder::new(config.metrics.response_buffer_capacity));
        let cache = Arc::new(CacheService::from_config(&config.cache)?);

        let health = Arc::new(
            HealthOrchestrator::new(metrics.clone())
                .with_default_timeout(Duration::from_millis(config.health.default_timeout_ms))
                .with_alert_thresholds(AlertThresholds {
                    error_rate_percent: config.metrics.error_rate_alert_percent,
                    blocked_requests: config.metrics.blocked_requests_alert,
                }),
        );
        register_default_checks(&health, cache.clone(), &config.health);

        let limiter = Arc::new(SlidingWindowLimiter::new(config.rate_limit.max_keys));

        tracing::info!(
            cache_backend = ?config.cache.backend,
            namespace = %config.cache.namespace,
            rate_limit_enabled = config.rate_limit.enabled,
            checks = health.check_names().len(),
            "Resilience core built"
        );

        Ok(Self {
            config,
            metrics,
            cache,
            health,
            limiter,
        })
    }

    /// Connect the cache and spawn the background loops.
    pub async fn start(&self, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        if !self.cache.connect().await {
            tracing::warn!("Starting without cache; reconnect loop will keep trying");
        }

        let mut tasks = Vec::new();

        tasks.push(tokio::spawn(self.cache.clone().run_reconnect(
            Duration::from_secs(self.config.cache.reconnect_interval_secs),
            shutdown.subscribe(),
        )));

        if self.config.rate_limit.enabled {
            tasks.push(tokio::spawn(self.limiter.clone().run_sweeper(
                Duration::from_secs(self.config.rate_limit.sweep_interval_secs),
                shutdown.subscribe(),
            )));
        }

        if self.config.health.periodic_enabled {
            let monitor = HealthMonitor::new(
                self.health.clone(),
                Duration::from_secs(self.config.health.interval_secs),
            );
            tasks.push(tokio::spawn(monitor.run(shutdown.subscribe())));
        } else {
            tracing::info!("Periodic health checks disabled");
        }

        tasks
    }

    /// Close the cache connection. Background loops stop on the shutdown signal.
    pub async fn stop(&self) {
        self.cache.close().await;
        tracing::info!("Resilience core stopped");
    }
}
