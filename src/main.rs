//! scout-resilience
//!
//! Operational resilience core of the subnet scout dashboard, served over HTTP.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────┐
//!                      │                  ResilienceCore                  │
//!   Client Request     │  ┌──────────┐   ┌────────────┐   ┌────────────┐  │
//!   ───────────────────┼─▶│ metrics  │──▶│ rate limit │──▶│  handlers  │  │
//!                      │  │middleware│   │ (per IP)   │   │ + gate     │  │
//!                      │  └──────────┘   └────────────┘   └─────┬──────┘  │
//!                      │                                        │         │
//!                      │        ┌───────────────┬───────────────┤         │
//!                      │        ▼               ▼               ▼         │
//!                      │  ┌───────────┐   ┌───────────┐   ┌───────────┐   │
//!                      │  │  health   │──▶│   cache   │   │ recorder  │   │
//!                      │  │orchestr.  │   │(fail-open)│   │ (metrics) │   │
//!                      │  └───────────┘   └─────┬─────┘   └───────────┘   │
//!                      └────────────────────────┼─────────────────────────┘
//!                                               ▼
//!                                      Redis / in-memory store
//! ```
//!
//! Configuration comes from the TOML file named by the first argument or
//! `SCOUT_CONFIG`, falling back to defaults. `REDIS_*` variables override the
//! cache connection either way.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use scout_resilience::config::{load_config, load_from_env};
use scout_resilience::lifecycle::{shutdown_signal, ResilienceCore, Shutdown};
use scout_resilience::observability::{logging, metrics};
use scout_resilience::HttpServer;

/// How long background loops get to exit after the server stops.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SCOUT_CONFIG").ok())
        .map(PathBuf::from);

    let config = match &config_path {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?config_path,
        bind_address = %config.server.bind_address,
        "scout-resilience starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let core = Arc::new(ResilienceCore::build(config)?);

    let shutdown = Arc::new(Shutdown::new());
    let tasks = core.start(&shutdown).await;

    let server = HttpServer::new(core.clone());
    let trigger = shutdown.clone();
    server
        .run(listener, async move {
            shutdown_signal().await;
            trigger.trigger();
        })
        .await?;

    let stopped = shutdown.drain(tasks, SHUTDOWN_GRACE).await;
    tracing::debug!(stopped, "Background tasks drained");
    core.stop().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
