//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request handling produces:
//!     → recorder.rs (in-process counters + latency window, JSON snapshot)
//!     → metrics.rs (Prometheus counters, gauges, histograms)
//!     → logging.rs (structured log events)
//!
//! Consumers:
//!     → /metrics and /health payloads (recorder snapshot)
//!     → Prometheus scrape (optional exporter)
//!     → Log aggregation (stdout, JSON or pretty)
//! ```
//!
//! # Design Decisions
//! - The recorder is an explicit instance owned by the core, never a global
//! - Prometheus mirrors are cheap (atomic increments) and fire-and-forget

pub mod logging;
pub mod metrics;
pub mod recorder;

pub use recorder::{MetricsRecorder, MetricsSnapshot, SecurityEvent};
