//! In-process backing store.
//!
//! Used when no Redis is configured and in tests. Entries expire lazily on
//! read. `set_online(false)` makes every command fail with a connection error,
//! which is how outages are simulated.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use globset::{GlobBuilder, GlobMatcher};

use crate::cache::backend::{BackendError, CacheBackend};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct MemoryBackend {
    entries: DashMap<String, Entry>,
    online: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            online: AtomicBool::new(true),
        }
    }

    /// Simulate the store going away (`false`) or coming back (`true`).
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Live (unexpired) entry count.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| e.expires_at > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_online(&self) -> Result<(), BackendError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::Connection("memory store offline".to_string()))
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn ping(&self) -> Result<(), BackendError> {
        self.ensure_online()
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        self.ensure_online()?;
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, e| e.expires_at <= now);
        }
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), BackendError> {
        self.ensure_online()?;
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64, BackendError> {
        self.ensure_online()?;
        let now = Instant::now();
        let removed = keys
            .iter()
            .filter_map(|k| self.entries.remove(k))
            .filter(|(_, e)| e.expires_at > now)
            .count();
        Ok(removed as u64)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, BackendError> {
        self.ensure_online()?;
        let matcher = key_matcher(pattern)?;
        let now = Instant::now();
        Ok(self
            .entries
            .iter()
            .filter(|e| e.expires_at > now && matcher.is_match(e.key()))
            .map(|e| e.key().clone())
            .collect())
    }
}

/// Compile a Redis-style key pattern: `*`, `?`, `[...]` classes, `\` escapes.
///
/// Keys are not paths, so `*` also crosses `/`.
pub fn key_matcher(pattern: &str) -> Result<GlobMatcher, BackendError> {
    GlobBuilder::new(pattern)
        .literal_separator(false)
        .backslash_escape(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| BackendError::Command(format!("invalid key pattern '{}': {}", pattern, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, key: &str) -> bool {
        key_matcher(pattern).unwrap().is_match(key)
    }

    #[test]
    fn test_key_patterns() {
        assert!(matches("subnet-scout:*", "subnet-scout:entity:7"));
        assert!(matches("*:entity:?", "subnet-scout:entity:7"));
        assert!(!matches("*:entity:?", "subnet-scout:entity:17"));
        assert!(!matches("other:*", "subnet-scout:entity:7"));
        assert!(matches("a*b*c", "axxbyyc"));
        assert!(matches("ns:*", "ns:github/owner/repo"));
    }

    #[test]
    fn test_key_pattern_classes_and_escapes() {
        assert!(matches("ns:[ab]:*", "ns:a:1"));
        assert!(matches("ns:[ab]:*", "ns:b:1"));
        assert!(!matches("ns:[ab]:*", "ns:c:1"));
        assert!(matches("ns:[!ab]:*", "ns:c:1"));
        assert!(matches(r"ns:\*", "ns:*"));
        assert!(!matches(r"ns:\*", "ns:x"));
    }

    #[tokio::test]
    async fn test_invalid_pattern_is_command_error() {
        let store = MemoryBackend::new();
        assert!(matches!(store.keys("ns:[ab").await, Err(BackendError::Command(_))));
    }

    #[tokio::test]
    async fn test_clear_large_keyspace() {
        let store = MemoryBackend::new();
        for i in 0..5000 {
            let ttl = Duration::from_secs(60);
            store.set_ex(&format!("scout:entity:{}", i), "v".into(), ttl).await.unwrap();
            store.set_ex(&format!("other:entity:{}", i), "v".into(), ttl).await.unwrap();
        }

        let keys = store.keys("scout:*").await.unwrap();
        assert_eq!(keys.len(), 5000);
        assert_eq!(store.del(&keys).await.unwrap(), 5000);
        assert_eq!(store.len(), 5000);
        assert!(store.keys("scout:*").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let store = MemoryBackend::new();
        store
            .set_ex("k", "v".into(), Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_offline_store_fails_every_command() {
        let store = MemoryBackend::new();
        store.set_online(false);
        assert!(matches!(store.ping().await, Err(BackendError::Connection(_))));
        assert!(store.get("k").await.is_err());
        assert!(store.set_ex("k", "v".into(), Duration::from_secs(1)).await.is_err());
        assert!(store.keys("*").await.is_err());
    }
}
