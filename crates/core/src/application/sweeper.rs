// Expiry Sweeper - periodic background sweep

use super::manager::QueueManager;
use crate::error::{AppError, Result};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Default interval between sweeps (1 minute)
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Runs `QueueManager::sweep_expired` on a fixed interval, independent of
/// the per-request timers
pub struct ExpirySweeper {
    manager: QueueManager,
    interval: Duration,
}

impl ExpirySweeper {
    /// Create a new sweeper
    ///
    /// # Arguments
    /// * `manager` - Queue manager to sweep
    /// * `interval` - Time between sweeps
    ///
    /// # Errors
    /// `AppError::Config` for a zero interval
    pub fn new(manager: QueueManager, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(AppError::Config(
                "sweep interval must be greater than zero".to_string(),
            ));
        }
        Ok(Self { manager, interval })
    }

    /// Run the sweep loop until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            "Expiry sweeper started"
        );

        let mut tick = interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.manager.sweep_expired();
                }
                _ = shutdown.cancelled() => {
                    info!("Expiry sweeper shutting down");
                    break;
                }
            }
        }
    }

    /// Spawn the loop on the current runtime
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
