//! Operational resilience core for the subnet scout dashboard.
//!
//! Health orchestration, request metrics, a fail-open cache, and a
//! sliding-window rate limiter with an input validation gate.

pub mod cache;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::CoreConfig;
pub use http::HttpServer;
pub use lifecycle::{ResilienceCore, Shutdown};
