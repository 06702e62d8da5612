//! Built-in checks registered at startup.

use std::path::PathBuf;
use std::sync::Arc;

use sysinfo::System;
use uuid::Uuid;

use crate::cache::CacheService;
use crate::config::HealthConfig;
use crate::health::check::{CheckOutcome, CheckStatus, ProbeResult};
use crate::health::orchestrator::HealthOrchestrator;

/// System memory usage above which the `memory` check reports critical.
pub const MEMORY_CRITICAL_PERCENT: f64 = 90.0;
pub const MEMORY_DEGRADED_PERCENT: f64 = 75.0;

/// Register `cache`, `memory`, `filesystem`, and one check per provider key.
pub fn register_default_checks(health: &HealthOrchestrator, cache: Arc<CacheService>, config: &HealthConfig) {
    health.register(
        "cache",
        move || {
            let cache = cache.clone();
            async move { cache_check(&cache).await }
        },
        None,
    );

    health.register("memory", || async { memory_check() }, None);

    let dir = PathBuf::from(&config.writable_dir);
    health.register(
        "filesystem",
        move || {
            let dir = dir.clone();
            async move { filesystem_check(dir).await }
        },
        None,
    );

    for provider in &config.provider_keys {
        let env_var = provider.env_var.clone();
        health.register(
            provider.name.clone(),
            move || {
                let env_var = env_var.clone();
                async move { Ok(env_key_check(&env_var, std::env::var(&env_var).ok())) }
            },
            None,
        );
    }

    tracing::info!(checks = ?health.check_names(), "Default health checks registered");
}

/// Cache round-trip probe, reported with its own status.
pub async fn cache_check(cache: &CacheService) -> ProbeResult {
    let probe = cache.health_check().await;
    Ok(CheckOutcome::from_value(serde_json::to_value(probe)?))
}

pub fn memory_check() -> ProbeResult {
    let mut sys = System::new();
    sys.refresh_memory();
    let total = sys.total_memory();
    if total == 0 {
        return Err("memory statistics unavailable".into());
    }
    Ok(memory_outcome(sys.used_memory(), total))
}

fn memory_outcome(used: u64, total: u64) -> CheckOutcome {
    let percent = used as f64 / total as f64 * 100.0;
    let status = if percent > MEMORY_CRITICAL_PERCENT {
        CheckStatus::Critical
    } else if percent > MEMORY_DEGRADED_PERCENT {
        CheckStatus::Degraded
    } else {
        CheckStatus::Up
    };

    CheckOutcome::with_status(status)
        .detail("used", format!("{}MB", used / 1024 / 1024))
        .detail("total", format!("{}MB", total / 1024 / 1024))
        .detail("usage_percentage", format!("{:.2}%", percent))
}

/// Write and remove a probe file in `dir`.
pub async fn filesystem_check(dir: PathBuf) -> ProbeResult {
    let probe = dir.join(format!(".health-{}", Uuid::new_v4()));
    let written = async {
        tokio::fs::write(&probe, b"ok").await?;
        tokio::fs::remove_file(&probe).await
    }
    .await;

    Ok(match written {
        Ok(()) => CheckOutcome::up()
            .detail("message", "File system writable")
            .detail("path", dir.display().to_string()),
        Err(e) => CheckOutcome::with_status(CheckStatus::Down)
            .detail("message", "File system not writable")
            .detail("path", dir.display().to_string())
            .detail("error", e.to_string()),
    })
}

/// `disabled` when the credential is absent or empty, `up` otherwise.
pub fn env_key_check(env_var: &str, value: Option<String>) -> CheckOutcome {
    match value.filter(|v| !v.trim().is_empty()) {
        Some(_) => CheckOutcome::up().detail("message", format!("{} configured", env_var)),
        None => CheckOutcome::with_status(CheckStatus::Disabled)
            .detail("message", format!("{} not configured", env_var)),
    }
}
