//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-IP sliding window, 429 on overflow)
//!     → gate.rs (compute limit per kind, body validation)
//!         → validation.rs (per-kind field rules)
//!         → sanitize.rs (character filtering, suspicious-text heuristics)
//!     → handler receives sanitized fields only
//! ```
//!
//! # Design Decisions
//! - Fail closed on input: any validation error rejects the whole request
//! - Validation reports every problem at once rather than the first
//! - Rejections are counted as security events in the recorder

pub mod gate;
pub mod rate_limit;
pub mod sanitize;
pub mod validation;

pub use gate::{request_metrics_middleware, screen};
pub use rate_limit::{rate_limit_middleware, SlidingWindowLimiter};
pub use sanitize::{detect_suspicious_pattern, sanitize_string};
pub use validation::{validate_bounded_int, validate_request_body, RequestKind, ValidationOutcome};
