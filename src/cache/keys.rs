//! Key namespacing and TTL policies.

use std::collections::HashMap;
use std::fmt::Display;
use std::time::Duration;

use crate::config::CacheConfig;

/// Build `namespace:kind:identifier[:param...]`.
///
/// `kind` separates use-cases; two use-cases sharing a `kind` share a keyspace.
pub fn build_key(namespace: &str, kind: &str, identifier: impl Display, params: &[&str]) -> String {
    let mut key = format!("{}:{}:{}", namespace, kind, identifier);
    for param in params {
        key.push(':');
        key.push_str(param);
    }
    key
}

/// Per-use-case TTL lookup table.
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    policies: HashMap<String, Duration>,
    default: Duration,
}

impl TtlPolicy {
    pub fn new(policies: HashMap<String, Duration>, default: Duration) -> Self {
        Self { policies, default }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            policies: config
                .ttl_policies
                .iter()
                .map(|(k, v)| (k.clone(), Duration::from_secs(*v)))
                .collect(),
            default: Duration::from_secs(config.default_ttl_secs),
        }
    }

    /// TTL for `use_case`, falling back to the default.
    pub fn ttl_for(&self, use_case: &str) -> Duration {
        self.policies.get(use_case).copied().unwrap_or(self.default)
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_key() {
        assert_eq!(build_key("subnet-scout", "entity", 7, &[]), "subnet-scout:entity:7");
        assert_eq!(
            build_key("subnet-scout", "analysis", 7, &["forecast", "24h"]),
            "subnet-scout:analysis:7:forecast:24h"
        );
    }

    #[test]
    fn test_ttl_lookup() {
        let policy = TtlPolicy::default();
        assert_eq!(policy.ttl_for("entity"), Duration::from_secs(300));
        assert_eq!(policy.ttl_for("distributed"), Duration::from_secs(120));
        assert_eq!(policy.ttl_for("unknown"), Duration::from_secs(3600));
    }
}
