// Completion & per-request timeout

use super::QueueManager;
use crate::domain::QueueError;
use tracing::{debug, warn};

impl QueueManager {
    /// Release the slot held by `request_id` and promote waiting work into it.
    ///
    /// Unknown or already-completed requests are a no-op, so a second report
    /// for the same ID has no effect. Returns whether a slot was released.
    pub fn report_completion(&self, user_id: &str, request_id: &str) -> bool {
        let now = self.now_millis();

        let released = self
            .users()
            .with_existing(user_id, |state| {
                // Dropping the slot disarms its timer and closes its events
                if state.active.remove(request_id).is_none() {
                    return false;
                }
                let promoted = state.promote_waiting(now);
                debug!(
                    user_id = %user_id,
                    request_id = %request_id,
                    promoted = promoted.len(),
                    "Request completed"
                );
                true
            })
            .unwrap_or(false);

        if !released {
            debug!(
                user_id = %user_id,
                request_id = %request_id,
                "Completion for unknown request ignored"
            );
        }
        released
    }

    /// Evict a request that outlived its timeout, waiting or active.
    ///
    /// Fired by the timer armed at admission. The caller receives `Timeout`;
    /// an evicted active request frees its slot for the next waiting one.
    /// No-op if the request already left.
    pub fn timeout_request(&self, user_id: &str, request_id: &str) -> bool {
        let now = self.now_millis();

        self.users()
            .with_existing(user_id, |state| {
                if let Some(slot) = state.active.remove(request_id) {
                    let timeout_ms = slot.config.request_timeout_ms();
                    warn!(
                        user_id = %user_id,
                        request_id = %request_id,
                        timeout_ms = timeout_ms,
                        "Active request timed out"
                    );
                    slot.events.reject(QueueError::Timeout { timeout_ms });
                    state.promote_waiting(now);
                    return true;
                }

                if let Some(entry) = state.waiting.remove(request_id) {
                    let timeout_ms = entry.config.request_timeout_ms();
                    warn!(
                        user_id = %user_id,
                        request_id = %request_id,
                        timeout_ms = timeout_ms,
                        "Queued request timed out"
                    );
                    entry.events.reject(QueueError::Timeout { timeout_ms });
                    return true;
                }

                false
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{admit, manager_with};
    use crate::application::RequestEvent;
    use crate::domain::{QueueConfig, QueueError, QueueStats};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_completion_promotes_next_in_fifo_order() {
        let config = QueueConfig::default().with_max_concurrent_per_user(1);
        let (manager, clock) = manager_with(config);

        let r1 = admit(&manager, "u1").unwrap();
        let mut r2 = admit(&manager, "u1").unwrap();
        let mut r3 = admit(&manager, "u1").unwrap();
        assert_eq!(r2.events.try_next(), None);

        clock.advance(250);
        assert!(manager.report_completion("u1", &r1.request_id));

        assert_eq!(r2.events.try_next(), Some(RequestEvent::Started { started_at: 1250 }));
        assert_eq!(r3.events.try_next(), None);
        assert_eq!(
            manager.get_queue_stats("u1", Some(&r3.request_id)),
            QueueStats::new(1, 1, Some(1))
        );
    }

    #[test]
    fn test_double_completion_is_noop() {
        let config = QueueConfig::default().with_max_concurrent_per_user(1);
        let (manager, _clock) = manager_with(config);

        let r1 = admit(&manager, "u1").unwrap();
        let r2 = admit(&manager, "u1").unwrap();
        let r3 = admit(&manager, "u1").unwrap();

        assert!(manager.report_completion("u1", &r1.request_id));
        let after_first = manager.get_queue_stats("u1", Some(&r3.request_id));

        assert!(!manager.report_completion("u1", &r1.request_id));
        assert_eq!(manager.get_queue_stats("u1", Some(&r3.request_id)), after_first);
        assert_eq!(after_first, QueueStats::new(1, 1, Some(1)));

        assert!(manager.report_completion("u1", &r2.request_id));
        assert!(manager.report_completion("u1", &r3.request_id));
        assert_eq!(manager.tracked_users(), 0);
    }

    #[test]
    fn test_completion_unknown_user() {
        let (manager, _clock) = manager_with(QueueConfig::default());
        assert!(!manager.report_completion("ghost", "nope"));
        assert_eq!(manager.tracked_users(), 0);
    }

    #[test]
    fn test_promotion_skips_cancelled_entries() {
        let config = QueueConfig::default().with_max_concurrent_per_user(1);
        let (manager, _clock) = manager_with(config);

        let r1 = admit(&manager, "u1").unwrap();
        let token = CancellationToken::new();
        let mut r2 = manager
            .request_admission(
                crate::AdmissionRequest::new("u1", "tutor", Default::default())
                    .with_cancellation(token.clone()),
            )
            .unwrap();
        let mut r3 = admit(&manager, "u1").unwrap();
        let mut r4 = admit(&manager, "u1").unwrap();

        token.cancel();
        manager.report_completion("u1", &r1.request_id);

        assert_eq!(r2.events.try_next(), Some(RequestEvent::Rejected(QueueError::Cancelled)));
        assert!(matches!(r3.events.try_next(), Some(RequestEvent::Started { .. })));
        assert_eq!(r4.events.try_next(), None);
        assert_eq!(manager.get_queue_stats("u1", None), QueueStats::new(1, 1, None));
    }

    #[test]
    fn test_completion_closes_event_channel() {
        let (manager, _clock) = manager_with(QueueConfig::default());
        let mut r1 = admit(&manager, "u1").unwrap();

        assert!(matches!(r1.events.try_next(), Some(RequestEvent::Started { .. })));
        manager.report_completion("u1", &r1.request_id);
        assert_eq!(r1.events.try_next(), None);
    }

    #[test]
    fn test_timeout_request_active_promotes() {
        let config = QueueConfig::default()
            .with_max_concurrent_per_user(1)
            .with_request_timeout(Duration::from_millis(50));
        let (manager, _clock) = manager_with(config);

        let mut r1 = admit(&manager, "u1").unwrap();
        let mut r2 = admit(&manager, "u1").unwrap();
        r1.events.try_next();

        assert!(manager.timeout_request("u1", &r1.request_id));
        assert_eq!(
            r1.events.try_next(),
            Some(RequestEvent::Rejected(QueueError::Timeout { timeout_ms: 50 }))
        );
        assert!(matches!(r2.events.try_next(), Some(RequestEvent::Started { .. })));

        // Already gone
        assert!(!manager.timeout_request("u1", &r1.request_id));
    }

    #[test]
    fn test_timeout_request_waiting() {
        let config = QueueConfig::default().with_max_concurrent_per_user(1);
        let (manager, _clock) = manager_with(config);

        admit(&manager, "u1").unwrap();
        let mut r2 = admit(&manager, "u1").unwrap();

        assert!(manager.timeout_request("u1", &r2.request_id));
        assert_eq!(
            r2.events.try_next(),
            Some(RequestEvent::Rejected(QueueError::Timeout { timeout_ms: 60_000 }))
        );
        assert_eq!(manager.get_queue_stats("u1", None), QueueStats::new(0, 1, None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_armed_timer_times_out_queued_request() {
        let config = QueueConfig::default()
            .with_max_concurrent_per_user(1)
            .with_request_timeout(Duration::from_millis(50));
        let (manager, _clock) = manager_with(config);

        let r1 = admit(&manager, "u1").unwrap();
        let mut r2 = admit(&manager, "u1").unwrap();

        // Both timers fire; r1's slot is reclaimed as well
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(
            r2.events.rejection().await,
            Some(QueueError::Timeout { timeout_ms: 50 })
        );
        assert!(manager.get_queue_stats("u1", Some(&r2.request_id)).position.is_none());
        assert!(!manager.report_completion("u1", &r1.request_id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_disarms_timer() {
        let config = QueueConfig::default().with_request_timeout(Duration::from_millis(50));
        let (manager, _clock) = manager_with(config);

        let mut r1 = admit(&manager, "u1").unwrap();
        assert!(manager.report_completion("u1", &r1.request_id));

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(matches!(r1.events.next().await, Some(RequestEvent::Started { .. })));
        assert_eq!(r1.events.next().await, None);
    }
}
