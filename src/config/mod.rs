//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (REDIS_* environment overrides)
//!     → validation.rs (semantic checks)
//!     → CoreConfig (validated, immutable)
//!     → handed to ResilienceCore at startup
//! ```
//!
//! # Design Decisions
//! - Config is read once at process start; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_env, ConfigError};
pub use schema::{
    CacheBackendKind, CacheConfig, CoreConfig, HealthConfig, MetricsConfig, ObservabilityConfig,
    ProviderKeyCheck, RateLimitConfig, ServerConfig,
};
