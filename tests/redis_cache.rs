//! Cache behaviour against a real Redis server.
//!
//! The round-trip test requires Redis on `REDIS_HOST`/`REDIS_PORT` (default
//! localhost:6379): `cargo test --test redis_cache -- --ignored`. The
//! fail-open test needs no server.

use std::time::Duration;

use serde_json::json;

use scout_resilience::cache::{CacheService, ConnectionState, ProbeStatus};
use scout_resilience::config::load_from_env;

#[tokio::test]
#[ignore]
async fn test_round_trip_against_redis() {
    let mut config = load_from_env().unwrap();
    config.cache.namespace = format!("scout-test-{}", std::process::id());

    let cache = CacheService::from_config(&config.cache).unwrap();
    assert!(cache.connect().await, "Redis is not reachable");
    assert_eq!(cache.state(), ConnectionState::Ready);

    let key = cache.key("entity", 42, &[]);
    assert!(cache.set(&key, &json!({"score": 90}), Duration::from_secs(30)).await.unwrap());
    assert_eq!(cache.get::<serde_json::Value>(&key).await, Some(json!({"score": 90})));

    assert_eq!(cache.health_check().await.status, ProbeStatus::Up);

    assert!(cache.clear(None).await);
    assert_eq!(cache.get::<serde_json::Value>(&key).await, None);

    cache.close().await;
    assert_eq!(cache.state(), ConnectionState::Ended);
}

#[tokio::test]
async fn test_unreachable_redis_fails_open() {
    let mut config = load_from_env().unwrap();
    config.cache.port = 1;

    let cache = CacheService::from_config(&config.cache).unwrap();
    assert!(!cache.connect().await);
    assert_eq!(cache.state(), ConnectionState::Disconnected);
    assert_eq!(cache.get::<serde_json::Value>("anything").await, None);
    assert!(!cache.set("anything", &1, Duration::from_secs(1)).await.unwrap());
}
