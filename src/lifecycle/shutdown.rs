//! Shutdown coordination.
//!
//! The cache reconnect loop, the rate limit sweeper, and the health monitor
//! each hold a receiver and leave their `select!` loop on the first message.
//! `drain` then waits for those loops with a grace period.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver for one background loop.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Fire the signal. Safe to call more than once.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Background loops that have not dropped their receiver yet.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Trigger, then wait up to `grace` for each background loop.
    ///
    /// Loops still running after the grace period are aborted. Returns how
    /// many loops exited on their own.
    pub async fn drain(&self, tasks: Vec<JoinHandle<()>>, grace: Duration) -> usize {
        self.trigger();

        let mut clean = 0;
        for mut task in tasks {
            match tokio::time::timeout(grace, &mut task).await {
                Ok(Ok(())) => clean += 1,
                Ok(Err(e)) => tracing::error!(error = %e, "Background task ended abnormally"),
                Err(_) => {
                    tracing::warn!(grace_ms = grace.as_millis() as u64, "Background task did not stop, aborting");
                    task.abort();
                }
            }
        }
        clean
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_every_subscriber() {
        let shutdown = Shutdown::new();
        let mut a = shutdown.subscribe();
        let mut b = shutdown.subscribe();
        assert_eq!(shutdown.receiver_count(), 2);

        shutdown.trigger();
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }

    #[test]
    fn test_trigger_without_subscribers() {
        Shutdown::new().trigger();
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_aborts_stuck_loops() {
        let shutdown = Shutdown::new();

        let mut rx = shutdown.subscribe();
        let listening = tokio::spawn(async move {
            let _ = rx.recv().await;
        });
        let stuck = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        let clean = shutdown.drain(vec![listening, stuck], Duration::from_secs(1)).await;
        assert_eq!(clean, 1);
        assert_eq!(shutdown.receiver_count(), 0);
    }
}
