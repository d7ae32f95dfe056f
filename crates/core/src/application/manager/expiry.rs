// Expiry sweep - safety net behind the per-request timers

use super::QueueManager;
use crate::domain::{QueueError, RequestId};
use tracing::{debug, warn};

/// What one sweep pass removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Waiting requests older than their timeout
    pub expired: usize,
    /// Waiting requests whose cancellation token had fired
    pub cancelled: usize,
    /// Active slots older than their timeout (leaked completions)
    pub reclaimed: usize,
    /// Waiting requests promoted into reclaimed capacity
    pub promoted: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired == 0 && self.cancelled == 0 && self.reclaimed == 0 && self.promoted == 0
    }
}

impl QueueManager {
    /// Scan every user once and evict stale entries.
    ///
    /// Waiting requests older than their `request_timeout` are rejected with
    /// `Expired`, waiting requests with a fired cancellation token with
    /// `Cancelled`. Active slots older than their timeout are reclaimed
    /// (`Expired`) and the freed capacity is refilled from the queue.
    /// Requests already removed by their own timer are simply not found.
    pub fn sweep_expired(&self) -> SweepReport {
        let now = self.now_millis();
        let mut report = SweepReport::default();

        for user_id in self.users().user_ids() {
            self.users().with_existing(&user_id, |state| {
                let stale = state.waiting.drain_where(|entry| {
                    entry.record.is_cancelled()
                        || entry.record.age_millis(now) > entry.config.request_timeout_ms()
                });
                for (request_id, entry) in stale {
                    if entry.record.is_cancelled() {
                        debug!(user_id = %user_id, request_id = %request_id, "Swept cancelled request");
                        entry.events.reject(QueueError::Cancelled);
                        report.cancelled += 1;
                    } else {
                        let age_ms = entry.record.age_millis(now);
                        entry.events.reject(QueueError::Expired { age_ms });
                        report.expired += 1;
                    }
                }

                let leaked: Vec<RequestId> = state
                    .active
                    .iter()
                    .filter(|(_, slot)| slot.request.age_millis(now) > slot.config.request_timeout_ms())
                    .map(|(id, _)| id.clone())
                    .collect();
                for request_id in leaked {
                    if let Some(slot) = state.active.remove(&request_id) {
                        let age_ms = slot.request.age_millis(now);
                        warn!(
                            user_id = %user_id,
                            request_id = %request_id,
                            age_ms = age_ms,
                            "Reclaimed active slot never reported complete"
                        );
                        slot.events.reject(QueueError::Expired { age_ms });
                        report.reclaimed += 1;
                    }
                }

                report.promoted += state.promote_waiting(now).len();
            });
        }

        if report.is_empty() {
            debug!("Expiry sweep found nothing to evict");
        } else {
            warn!(
                expired = report.expired,
                cancelled = report.cancelled,
                reclaimed = report.reclaimed,
                promoted = report.promoted,
                "Expiry sweep evicted requests"
            );
        }
        report
    }
}
