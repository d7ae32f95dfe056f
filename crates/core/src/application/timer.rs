// Per-request timeout timers

use super::manager::QueueManager;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::debug;

/// Cancellable timer that calls `QueueManager::timeout_request` after the
/// request's timeout.
///
/// Stored with the waiting/active entry and moved along on promotion.
/// Dropping it aborts the timer task, so a request that left by any other
/// path can never be timed out afterwards.
#[derive(Debug)]
pub(crate) struct TimeoutTimer {
    handle: AbortHandle,
}

impl TimeoutTimer {
    /// Arm a timer on the current tokio runtime.
    ///
    /// Returns `None` outside a runtime; the periodic sweep still evicts the
    /// request in that case.
    pub(crate) fn arm(
        manager: &QueueManager,
        user_id: &str,
        request_id: &str,
        after: Duration,
    ) -> Option<Self> {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                debug!(request_id = %request_id, "No runtime, timeout left to the sweeper");
                return None;
            }
        };

        let manager = manager.downgrade();
        let user_id = user_id.to_string();
        let request_id = request_id.to_string();

        let task = runtime.spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(manager) = manager.upgrade() {
                manager.timeout_request(&user_id, &request_id);
            }
        });

        Some(Self {
            handle: task.abort_handle(),
        })
    }
}

impl Drop for TimeoutTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
