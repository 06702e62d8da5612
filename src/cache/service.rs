//! Fail-open cache service.
//!
//! # States
//! - Disconnected: store unusable; reads miss, writes return `false`
//! - Connecting: a connect attempt is in flight
//! - Ready: commands go to the store
//! - Ended: closed on purpose; never reconnects
//!
//! # State Transitions
//! ```text
//! Disconnected → Connecting: connect() / reconnect loop tick
//! Connecting → Ready: ping succeeds
//! Connecting → Disconnected: ping fails
//! Ready → Disconnected: any store command fails
//! * → Ended: close()
//! ```
//!
//! # Design Decisions
//! - Operational failures are logged and counted, never returned as errors
//! - Serialization failure on `set` is a caller bug and is returned as `Err`
//! - No locking around the store; each command is atomic on its own

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time;

use crate::cache::backend::{BackendError, CacheBackend};
use crate::cache::keys::{build_key, TtlPolicy};
use crate::cache::memory::MemoryBackend;
use crate::cache::redis_store::{connection_info, RedisBackend};
use crate::config::{CacheBackendKind, CacheConfig};
use crate::observability::metrics;

/// Errors the cache hands back to callers.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The value could not be serialized. A bug in the calling code.
    #[error("cache value is not serializable: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend could not even be constructed (bad URL).
    #[error("cache backend unavailable: {0}")]
    Backend(#[from] BackendError),
}

/// Connection state of the backing store.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Ready = 2,
    Ended = 3,
}

impl From<u8> for ConnectionState {
    fn from(val: u8) -> Self {
        match val {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Ready,
            3 => ConnectionState::Ended,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Counter snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub connected: bool,
    pub state: ConnectionState,
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub operations: u64,
    /// `hits / (hits + misses)`, 0 when nothing was read.
    pub hit_rate: f64,
    pub total_requests: u64,
}

/// Outcome of the round-trip probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Up,
    Degraded,
    Error,
    Down,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheProbe {
    pub status: ProbeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub stats: CacheStats,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct ProbeValue {
    timestamp: i64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    operations: AtomicU64,
}

/// Namespaced, fail-open cache over a [`CacheBackend`].
pub struct CacheService {
    backend: Arc<dyn CacheBackend>,
    state: AtomicU8,
    counters: Counters,
    namespace: String,
    ttl: TtlPolicy,
}

impl CacheService {
    /// Wrap a backend. Starts `Disconnected`; call [`CacheService::connect`].
    pub fn new(backend: Arc<dyn CacheBackend>, namespace: impl Into<String>, ttl: TtlPolicy) -> Self {
        Self {
            backend,
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
            counters: Counters::default(),
            namespace: namespace.into(),
            ttl,
        }
    }

    /// Build the configured backend. Does not connect.
    pub fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        let backend: Arc<dyn CacheBackend> = match config.backend {
            CacheBackendKind::Redis => Arc::new(RedisBackend::new(connection_info(config))?),
            CacheBackendKind::Memory => Arc::new(MemoryBackend::new()),
        };
        Ok(Self::new(
            backend,
            config.namespace.clone(),
            TtlPolicy::from_config(config),
        ))
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from(self.state.load(Ordering::SeqCst))
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn ttl_policy(&self) -> &TtlPolicy {
        &self.ttl
    }

    /// Try to reach the store. Returns whether the cache is now ready.
    pub async fn connect(&self) -> bool {
        let previous = self.state();
        if previous == ConnectionState::Ended || previous == ConnectionState::Ready {
            return previous == ConnectionState::Ready;
        }
        if self
            .state
            .compare_exchange(
                previous as u8,
                ConnectionState::Connecting as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            // Someone else moved the state; report what they left.
            return self.is_ready();
        }
        tracing::info!(namespace = %self.namespace, "Cache connecting");

        match self.backend.ping().await {
            Ok(()) => {
                let _ = self.state.compare_exchange(
                    ConnectionState::Connecting as u8,
                    ConnectionState::Ready as u8,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                );
                let ready = self.is_ready();
                if ready {
                    tracing::info!(namespace = %self.namespace, "Cache connected and ready");
                }
                ready
            }
            Err(e) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                let _ = self.state.compare_exchange(
                    ConnectionState::Connecting as u8,
                    ConnectionState::Disconnected as u8,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                );
                tracing::warn!(error = %e, "Cache unavailable, running in fallback mode");
                false
            }
        }
    }

    /// Intentional shutdown. The service stays in `Ended` afterwards.
    pub async fn close(&self) {
        let was_ready = self.is_ready();
        self.state.store(ConnectionState::Ended as u8, Ordering::SeqCst);
        if was_ready {
            if let Err(e) = self.backend.quit().await {
                tracing::error!(error = %e, "Error closing cache connection");
            } else {
                tracing::info!("Cache connection closed");
            }
        }
    }

    /// Retry `connect` every `interval` while disconnected, until shutdown or `close`.
    pub async fn run_reconnect(self: Arc<Self>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.state() {
                        ConnectionState::Ended => break,
                        ConnectionState::Disconnected => {
                            self.connect().await;
                        }
                        _ => {}
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Cache reconnect loop received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    fn on_backend_error(&self, op: &'static str, key: &str, e: &BackendError) {
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_op(op, "error");
        tracing::error!(op, key, error = %e, "Cache command failed");
        if matches!(e, BackendError::Connection(_)) {
            let moved = self
                .state
                .compare_exchange(
                    ConnectionState::Ready as u8,
                    ConnectionState::Disconnected as u8,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok();
            if moved {
                tracing::warn!("Cache marked disconnected");
            }
        }
    }

    /// Build a key inside this service's namespace.
    pub fn key(&self, kind: &str, identifier: impl Display, params: &[&str]) -> String {
        build_key(&self.namespace, kind, identifier, params)
    }

    /// Read and deserialize `key`. `None` on miss, when not ready, or on any failure.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.is_ready() {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_op("get", "miss");
            return None;
        }

        self.counters.operations.fetch_add(1, Ordering::Relaxed);
        match self.backend.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    metrics::record_cache_op("get", "hit");
                    Some(value)
                }
                Err(e) => {
                    self.counters.errors.fetch_add(1, Ordering::Relaxed);
                    metrics::record_cache_op("get", "error");
                    tracing::warn!(key, error = %e, "Cached value failed to deserialize");
                    None
                }
            },
            Ok(None) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_op("get", "miss");
                None
            }
            Err(e) => {
                self.on_backend_error("get", key, &e);
                None
            }
        }
    }

    /// Serialize and store `value` for `ttl`.
    ///
    /// `Ok(false)` when the store is not ready or the write failed.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) -> Result<bool, CacheError> {
        if !self.is_ready() {
            return Ok(false);
        }

        self.counters.operations.fetch_add(1, Ordering::Relaxed);
        let serialized = serde_json::to_string(value)?;
        match self.backend.set_ex(key, serialized, ttl).await {
            Ok(()) => {
                metrics::record_cache_op("set", "ok");
                Ok(true)
            }
            Err(e) => {
                self.on_backend_error("set", key, &e);
                Ok(false)
            }
        }
    }

    pub async fn del(&self, key: &str) -> bool {
        if !self.is_ready() {
            return false;
        }

        self.counters.operations.fetch_add(1, Ordering::Relaxed);
        match self.backend.del(&[key.to_string()]).await {
            Ok(_) => {
                metrics::record_cache_op("del", "ok");
                true
            }
            Err(e) => {
                self.on_backend_error("del", key, &e);
                false
            }
        }
    }

    /// Delete every key matching `pattern`, or the whole namespace when `None`.
    pub async fn clear(&self, pattern: Option<&str>) -> bool {
        if !self.is_ready() {
            return false;
        }

        let pattern = pattern
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}:*", self.namespace));
        self.counters.operations.fetch_add(1, Ordering::Relaxed);

        let keys = match self.backend.keys(&pattern).await {
            Ok(keys) => keys,
            Err(e) => {
                self.on_backend_error("clear", &pattern, &e);
                return false;
            }
        };
        match self.backend.del(&keys).await {
            Ok(removed) => {
                metrics::record_cache_op("clear", "ok");
                tracing::info!(pattern = %pattern, removed, "Cleared cache entries");
                true
            }
            Err(e) => {
                self.on_backend_error("clear", &pattern, &e);
                false
            }
        }
    }

    /// Read a value for a TTL use-case; `use_case` doubles as the key kind.
    pub async fn get_for<T: DeserializeOwned>(&self, use_case: &str, identifier: impl Display, params: &[&str]) -> Option<T> {
        let key = self.key(use_case, identifier, params);
        self.get(&key).await
    }

    /// Store a value under a TTL use-case, with that use-case's TTL.
    pub async fn set_for<T: Serialize + ?Sized>(
        &self,
        use_case: &str,
        identifier: impl Display,
        params: &[&str],
        value: &T,
    ) -> Result<bool, CacheError> {
        let key = self.key(use_case, identifier, params);
        self.set(&key, value, self.ttl.ttl_for(use_case)).await
    }

    /// Set, read back, and delete a probe value.
    pub async fn health_check(&self) -> CacheProbe {
        if !self.is_ready() {
            return CacheProbe {
                status: ProbeStatus::Down,
                latency_ms: None,
                error: Some("Cache store not connected".to_string()),
                stats: self.stats(),
            };
        }

        let started = Instant::now();
        let key = self.key("health", "check", &[]);
        let probe = ProbeValue {
            timestamp: Utc::now().timestamp_millis(),
        };

        let outcome = async {
            self.set(&key, &probe, Duration::from_secs(60)).await?;
            let read_back: Option<ProbeValue> = self.get(&key).await;
            self.del(&key).await;
            Ok::<_, CacheError>(read_back)
        }
        .await;
        let latency_ms = Some(started.elapsed().as_millis() as u64);

        let (status, error) = match outcome {
            Err(e) => (ProbeStatus::Error, Some(e.to_string())),
            Ok(_) if !self.is_ready() => (
                ProbeStatus::Error,
                Some("Cache store failed during probe".to_string()),
            ),
            Ok(Some(value)) if value == probe => (ProbeStatus::Up, None),
            Ok(_) => (
                ProbeStatus::Degraded,
                Some("Probe value did not round-trip".to_string()),
            ),
        };

        CacheProbe {
            status,
            latency_ms,
            error,
            stats: self.stats(),
        }
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let state = self.state();
        CacheStats {
            connected: state == ConnectionState::Ready,
            state,
            hits,
            misses,
            errors: self.counters.errors.load(Ordering::Relaxed),
            operations: self.counters.operations.load(Ordering::Relaxed),
            hit_rate: if total == 0 { 0.0 } else { hits as f64 / total as f64 },
            total_requests: total,
        }
    }
}
