//! Backing store abstraction.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Failures reported by a backing store.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Store unreachable or connection dropped.
    #[error("connection error: {0}")]
    Connection(String),

    /// Store reachable but the command failed.
    #[error("command error: {0}")]
    Command(String),
}

/// Minimal command set the cache service needs from a store.
///
/// Each call is expected to be atomic on its own; the service never relies on
/// multi-command atomicity.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Round-trip to the store, establishing the connection if needed.
    async fn ping(&self) -> Result<(), BackendError>;

    async fn get(&self, key: &str) -> Result<Option<String>, BackendError>;

    /// Store `value` under `key`, expiring after `ttl`.
    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), BackendError>;

    /// Delete keys, returning how many existed.
    async fn del(&self, keys: &[String]) -> Result<u64, BackendError>;

    /// Keys matching a Redis-style glob pattern (`*`, `?`, `[...]`, `\` escapes).
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, BackendError>;

    /// Release the connection. Further calls may fail.
    async fn quit(&self) -> Result<(), BackendError> {
        Ok(())
    }
}
