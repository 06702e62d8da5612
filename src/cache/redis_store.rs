//! Redis backing store.
//!
//! The connection is established lazily on the first `ping`, so a store that is
//! down at startup leaves the cache disconnected instead of failing the process.
//! Once connected, `ConnectionManager` handles reconnection of the socket itself.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use tracing::{debug, error};

use crate::cache::backend::{BackendError, CacheBackend};
use crate::config::CacheConfig;

/// Upper bound on establishing a connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Keys requested per `SCAN` round trip.
const SCAN_COUNT: usize = 500;

/// Connection parameters from config. Credentials are passed as fields, never
/// through a URL, so passwords need no escaping.
pub fn connection_info(config: &CacheConfig) -> ConnectionInfo {
    ConnectionInfo {
        addr: ConnectionAddr::Tcp(config.host.clone(), config.port),
        redis: RedisConnectionInfo {
            db: config.db,
            password: config.password.clone().filter(|p| !p.is_empty()),
            ..Default::default()
        },
    }
}

pub struct RedisBackend {
    client: Client,
    connection: Mutex<Option<ConnectionManager>>,
}

impl RedisBackend {
    /// Create a backend for `info`. No I/O happens here.
    pub fn new(info: ConnectionInfo) -> Result<Self, BackendError> {
        let client = Client::open(info).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            BackendError::Connection(format!("invalid redis connection info: {}", e))
        })?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
        })
    }

    fn current(&self) -> Option<ConnectionManager> {
        self.connection
            .lock()
            .expect("redis connection mutex poisoned")
            .clone()
    }

    async fn connection(&self) -> Result<ConnectionManager, BackendError> {
        if let Some(conn) = self.current() {
            return Ok(conn);
        }

        let manager = tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(self.client.clone()))
            .await
            .map_err(|_| BackendError::Connection("connect timed out".to_string()))?
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        debug!("Redis connection established");
        *self.connection.lock().expect("redis connection mutex poisoned") = Some(manager.clone());
        Ok(manager)
    }

    fn classify(&self, e: redis::RedisError) -> BackendError {
        if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
            BackendError::Connection(e.to_string())
        } else {
            BackendError::Command(e.to_string())
        }
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn ping(&self) -> Result<(), BackendError> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| self.classify(e))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        let mut conn = self.connection().await?;
        redis::cmd("GET")
            .arg(key)
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(|e| self.classify(e))
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), BackendError> {
        let mut conn = self.connection().await?;
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| self.classify(e))
    }

    async fn del(&self, keys: &[String]) -> Result<u64, BackendError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection().await?;
        redis::cmd("DEL")
            .arg(keys)
            .query_async::<u64>(&mut conn)
            .await
            .map_err(|e| self.classify(e))
    }

    /// Cursor-based `SCAN`, so large keyspaces never block the store.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, BackendError> {
        let mut conn = self.connection().await?;
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async::<(u64, Vec<String>)>(&mut conn)
                .await
                .map_err(|e| self.classify(e))?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may return a key more than once.
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    async fn quit(&self) -> Result<(), BackendError> {
        self.connection
            .lock()
            .expect("redis connection mutex poisoned")
            .take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_info_from_config() {
        let config = CacheConfig {
            host: "cache.internal".into(),
            port: 6380,
            db: 2,
            ..CacheConfig::default()
        };
        let info = connection_info(&config);
        assert!(matches!(&info.addr, ConnectionAddr::Tcp(host, 6380) if host == "cache.internal"));
        assert_eq!(info.redis.db, 2);
        assert_eq!(info.redis.password, None);
    }

    #[test]
    fn test_password_with_url_delimiters() {
        let config = CacheConfig {
            password: Some("p#ss/w@rd".into()),
            ..CacheConfig::default()
        };
        let info = connection_info(&config);
        assert_eq!(info.redis.password.as_deref(), Some("p#ss/w@rd"));
        assert!(RedisBackend::new(info).is_ok());
    }

    #[test]
    fn test_empty_password_is_none() {
        let config = CacheConfig {
            password: Some(String::new()),
            ..CacheConfig::default()
        };
        assert_eq!(connection_info(&config).redis.password, None);
    }
}
