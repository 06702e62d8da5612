//! Periodic health monitoring.
//!
//! # Responsibilities
//! - Run every registered check on an interval
//! - Log overall status transitions

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::health::orchestrator::HealthOrchestrator;
use crate::health::report::OverallStatus;

pub struct HealthMonitor {
    health: Arc<HealthOrchestrator>,
    interval: Duration,
}

impl HealthMonitor {
    pub fn new(health: Arc<HealthOrchestrator>, interval: Duration) -> Self {
        Self { health, interval }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Health monitor starting");

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
        let mut last: Option<OverallStatus> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.health.run_all().await;
                    if last != Some(report.overall_status) {
                        match report.overall_status {
                            OverallStatus::Healthy => tracing::info!(status = report.overall_status.as_str(), "Overall health changed"),
                            _ => tracing::warn!(status = report.overall_status.as_str(), "Overall health changed"),
                        }
                        last = Some(report.overall_status);
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
