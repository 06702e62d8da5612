//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (checks.rs, or any caller):
//!     name + async check fn + timeout → orchestrator.rs registry
//!
//! On demand (GET /health) or periodic (monitor.rs):
//!     orchestrator.run_all()
//!     → one task per check, each raced against its timeout
//!     → results written back in one pass
//!     → report.rs (aggregate status, metrics snapshot, system.rs info)
//!
//! Cheap view (summary):
//!     stored results + metric thresholds → alerts
//! ```
//!
//! # Design Decisions
//! - Checks are opaque async functions; the orchestrator knows nothing about
//!   what they probe
//! - Status is re-evaluated on every run; there is no hysteresis
//! - Health state is per-process

pub mod check;
pub mod checks;
pub mod monitor;
pub mod orchestrator;
pub mod report;
pub mod system;

pub use check::{BoxError, CheckOutcome, CheckResult, CheckStatus, HealthCheck, ProbeResult};
pub use checks::register_default_checks;
pub use monitor::HealthMonitor;
pub use orchestrator::{AlertThresholds, HealthOrchestrator, DEFAULT_CHECK_TIMEOUT};
pub use report::{Alert, HealthReport, HealthSummary, OverallStatus};
pub use system::SystemInfo;
