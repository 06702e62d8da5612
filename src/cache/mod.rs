//! Cache subsystem.
//!
//! # Data Flow
//! ```text
//! Caller (business logic, health probe):
//!     → keys.rs (namespace:kind:id[:params], TTL per use-case)
//!     → service.rs (state gate, serialization, stats)
//!     → backend.rs trait
//!         → redis_store.rs (Redis via ConnectionManager)
//!         → memory.rs (in-process, tests and no-Redis deployments)
//! ```
//!
//! # Design Decisions
//! - Fail open: an unavailable store looks like an empty cache
//! - Connection state is tracked by the service, not inferred per call
//! - TTLs come from configuration, never from call sites

pub mod backend;
pub mod keys;
pub mod memory;
pub mod redis_store;
pub mod service;

pub use backend::{BackendError, CacheBackend};
pub use keys::{build_key, TtlPolicy};
pub use memory::MemoryBackend;
pub use redis_store::{connection_info, RedisBackend};
pub use service::{CacheError, CacheProbe, CacheService, CacheStats, ConnectionState, ProbeStatus};
