//! Sliding-window rate limiting.
//!
//! # Responsibilities
//! - Track request timestamps per arbitrary key
//! - Admit or reject against a (limit, window) pair chosen per call
//! - Bound memory: sweep idle keys, cap the number of tracked keys
//!
//! # Design Decisions
//! - Per-key state lives in a `DashMap`; check-and-record holds the shard lock,
//!   so concurrent callers on one key never over-admit
//! - A rejected request is not recorded and does not extend the window
//! - Entries exactly `window` old still count; older ones are pruned

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use serde_json::json;
use tokio::sync::broadcast;
use tokio::time;

use crate::lifecycle::ResilienceCore;
use crate::observability::metrics;
use crate::observability::SecurityEvent;

/// Default cap on distinct keys tracked at once.
pub const DEFAULT_MAX_KEYS: usize = 100_000;

struct WindowState {
    hits: VecDeque<Instant>,
    window: Duration,
}

impl WindowState {
    fn prune(&mut self, now: Instant) {
        let Some(cutoff) = now.checked_sub(self.window) else {
            return;
        };
        while self.hits.front().is_some_and(|t| *t < cutoff) {
            self.hits.pop_front();
        }
    }

    fn last_hit(&self) -> Option<Instant> {
        self.hits.back().copied()
    }
}

/// Sliding-window limiter keyed by caller-chosen strings.
pub struct SlidingWindowLimiter {
    windows: DashMap<String, WindowState>,
    max_keys: usize,
}

impl SlidingWindowLimiter {
    pub fn new(max_keys: usize) -> Self {
        Self {
            windows: DashMap::new(),
            max_keys: max_keys.max(1),
        }
    }

    /// Admit `key` if fewer than `limit` requests were admitted within `window`.
    ///
    /// An admitted request is recorded; a rejected one is not.
    pub fn check_rate_limit(&self, key: &str, limit: usize, window: Duration) -> bool {
        self.check_at(key, limit, window, Instant::now())
    }

    /// [`check_rate_limit`](Self::check_rate_limit) against an explicit clock.
    pub fn check_at(&self, key: &str, limit: usize, window: Duration, now: Instant) -> bool {
        if !self.windows.contains_key(key) && self.windows.len() >= self.max_keys {
            self.make_room(now);
        }

        let mut state = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| WindowState {
                hits: VecDeque::new(),
                window,
            });
        state.window = window;
        state.prune(now);

        if state.hits.len() >= limit {
            return false;
        }
        state.hits.push_back(now);
        true
    }

    /// Drop keys whose windows hold no live entries.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, state| {
            state.prune(now);
            !state.hits.is_empty()
        });
        before.saturating_sub(self.windows.len())
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn max_keys(&self) -> usize {
        self.max_keys
    }

    fn make_room(&self, now: Instant) {
        let removed = self.sweep_at(now);
        if self.windows.len() < self.max_keys {
            tracing::debug!(removed, "Rate limiter swept idle keys");
            return;
        }

        // Still full: evict the key that has been quiet the longest.
        let oldest = self
            .windows
            .iter()
            .min_by_key(|entry| entry.value().last_hit())
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.windows.remove(&key);
            tracing::debug!(key = %key, "Rate limiter evicted least recently used key");
        }
    }

    /// Periodically sweep idle keys until shutdown.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = interval.as_secs(), "Rate limit sweeper starting");

        let mut ticker = time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep();
                    metrics::record_rate_limit_keys(self.len());
                    if removed > 0 {
                        tracing::debug!(removed, remaining = self.len(), "Swept idle rate limit keys");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Rate limit sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

impl Default for SlidingWindowLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_KEYS)
    }
}

/// JSON body for a rejected request.
pub fn rate_limited_response(message: &str, window: Duration) -> Response {
    let body = json!({
        "error": {
            "code": "RATE_LIMIT_EXCEEDED",
            "message": message,
            "retry_after_secs": window.as_secs(),
        }
    });
    (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response()
}

/// Per-client-IP limit applied to every request.
pub async fn rate_limit_middleware(
    State(core): State<Arc<ResilienceCore>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let config = &core.config.rate_limit;
    if !config.enabled {
        return next.run(request).await;
    }

    let key = addr.ip().to_string();
    if core.limiter.check_rate_limit(&key, config.limit, config.window()) {
        return next.run(request).await;
    }

    tracing::warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
    metrics::record_rate_limited("ip");
    core.metrics.record_security_event(SecurityEvent::Blocked);
    rate_limited_response("Too many requests, please try again later", config.window())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const WINDOW: Duration = Duration::from_millis(1000);

    #[test]
    fn test_admits_up_to_limit_then_recovers() {
        let limiter = SlidingWindowLimiter::default();
        let t0 = Instant::now();

        let results: Vec<bool> = (0..4).map(|_| limiter.check_at("k", 3, WINDOW, t0)).collect();
        assert_eq!(results, vec![true, true, true, false]);

        assert!(limiter.check_at("k", 3, WINDOW, t0 + Duration::from_millis(1001)));
    }

    #[test]
    fn test_entry_at_window_edge_still_counts() {
        let limiter = SlidingWindowLimiter::default();
        let t0 = Instant::now();
        assert!(limiter.check_at("k", 1, WINDOW, t0));
        assert!(!limiter.check_at("k", 1, WINDOW, t0 + WINDOW));
        assert!(limiter.check_at("k", 1, WINDOW, t0 + WINDOW + Duration::from_millis(1)));
    }

    #[test]
    fn test_rejection_is_not_recorded() {
        let limiter = SlidingWindowLimiter::default();
        let t0 = Instant::now();
        assert!(limiter.check_at("k", 1, WINDOW, t0));
        for ms in [100, 200, 300] {
            assert!(!limiter.check_at("k", 1, WINDOW, t0 + Duration::from_millis(ms)));
        }
        // Only the first hit occupies the window.
        assert!(limiter.check_at("k", 1, WINDOW, t0 + Duration::from_millis(1001)));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = SlidingWindowLimiter::default();
        let t0 = Instant::now();
        assert!(limiter.check_at("a", 1, WINDOW, t0));
        assert!(!limiter.check_at("a", 1, WINDOW, t0));
        assert!(limiter.check_at("b", 1, WINDOW, t0));
    }

    #[test]
    fn test_zero_limit_rejects() {
        let limiter = SlidingWindowLimiter::default();
        assert!(!limiter.check_rate_limit("k", 0, WINDOW));
    }

    #[test]
    fn test_sweep_removes_idle_keys() {
        let limiter = SlidingWindowLimiter::default();
        let t0 = Instant::now();
        limiter.check_at("old", 5, WINDOW, t0);
        limiter.check_at("fresh", 5, WINDOW, t0 + Duration::from_millis(900));
        assert_eq!(limiter.len(), 2);

        let removed = limiter.sweep_at(t0 + Duration::from_millis(1500));
        assert_eq!(removed, 1);
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn test_max_keys_bound() {
        let limiter = SlidingWindowLimiter::new(3);
        let t0 = Instant::now();
        for (i, key) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            assert!(limiter.check_at(key, 5, WINDOW, t0 + Duration::from_millis(i as u64)));
            assert!(limiter.len() <= 3);
        }
        // "a" and "b" were the quietest and got evicted; "a" starts fresh.
        assert!(limiter.check_at("a", 1, WINDOW, t0 + Duration::from_millis(10)));
    }

    #[test]
    fn test_concurrent_callers_never_over_admit() {
        let limiter = Arc::new(SlidingWindowLimiter::default());
        let window = Duration::from_secs(60);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                thread::spawn(move || {
                    (0..50)
                        .filter(|_| limiter.check_rate_limit("shared", 100, window))
                        .count()
                })
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 100);
    }

    #[test]
    fn test_rate_limited_response_shape() {
        let response = rate_limited_response("slow down", Duration::from_secs(60));
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
