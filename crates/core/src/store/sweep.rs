//! Periodic removal of expired entries.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::Store;

/// Handle to a running sweeper task. Dropping it stops the sweeper.
#[derive(Debug)]
pub struct SweepHandle {
    task: JoinHandle<()>,
}

impl SweepHandle {
    /// Stop the sweeper.
    pub fn stop(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Shortest accepted sweep period.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Spawn a task that sweeps `store` every `every`.
///
/// The first sweep runs one full interval after spawning. Periods below
/// one millisecond are raised to it. Must be called from within a tokio
/// runtime.
pub fn spawn_sweeper(store: Arc<Store>, every: Duration) -> SweepHandle {
    let every = every.max(MIN_SWEEP_INTERVAL);
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match store.sweep_expired().await {
                Ok(0) => tracing::debug!("store sweep found nothing to remove"),
                Ok(removed) => tracing::info!(removed, "store sweep removed expired entries"),
                Err(e) => tracing::warn!(error = %e, "store sweep failed"),
            }
        }
    });

    SweepHandle { task }
}
