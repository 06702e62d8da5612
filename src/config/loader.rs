//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::CoreConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid environment override {var}={value}")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file, then apply environment overrides.
pub fn load_config(path: &Path) -> Result<CoreConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: CoreConfig = toml::from_str(&content)?;
    finish(config)
}

/// Defaults plus environment overrides, for running without a config file.
pub fn load_from_env() -> Result<CoreConfig, ConfigError> {
    finish(CoreConfig::default())
}

fn finish(mut config: CoreConfig) -> Result<CoreConfig, ConfigError> {
    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply the `REDIS_*` connection overrides. Read once at startup.
pub fn apply_env_overrides<F>(config: &mut CoreConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("REDIS_HOST") {
        config.cache.host = host;
    }
    if let Some(port) = lookup("REDIS_PORT") {
        config.cache.port = port.parse().map_err(|_| ConfigError::Env {
            var: "REDIS_PORT",
            value: port.clone(),
        })?;
    }
    if let Some(password) = lookup("REDIS_PASSWORD") {
        config.cache.password = Some(password);
    }
    if let Some(db) = lookup("REDIS_DB") {
        config.cache.db = db.parse().map_err(|_| ConfigError::Env {
            var: "REDIS_DB",
            value: db.clone(),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_overrides() {
        let env = HashMap::from([
            ("REDIS_HOST", "cache.internal"),
            ("REDIS_PORT", "6380"),
            ("REDIS_DB", "3"),
        ]);
        let mut config = CoreConfig::default();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.cache.host, "cache.internal");
        assert_eq!(config.cache.port, 6380);
        assert_eq!(config.cache.db, 3);
        assert!(config.cache.password.is_none());
    }

    #[test]
    fn test_bad_port_override() {
        let mut config = CoreConfig::default();
        let err = apply_env_overrides(&mut config, |k| {
            (k == "REDIS_PORT").then(|| "not-a-port".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "REDIS_PORT", .. }));
    }

    #[test]
    fn test_load_config_from_file() {
        let path = std::env::temp_dir().join(format!("scout-config-{}.toml", std::process::id()));
        std::fs::write(&path, "[server]\nbind_address = \"127.0.0.1:9999\"\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:9999");

        std::fs::remove_file(&path).unwrap_or_default();
    }
}
