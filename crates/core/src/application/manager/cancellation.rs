// Cancellation & bulk clear of waiting requests

use super::QueueManager;
use crate::domain::QueueError;
use tracing::{debug, info};

impl QueueManager {
    /// Remove a *waiting* request and tell its caller `Cancelled`.
    ///
    /// Active requests are not affected; in-flight work only stops through
    /// the caller's own cancellation token. Returns whether it was found.
    pub fn cancel_queued(&self, user_id: &str, request_id: &str) -> bool {
        let cancelled = self
            .users()
            .with_existing(user_id, |state| match state.waiting.remove(request_id) {
                Some(entry) => {
                    entry.events.reject(QueueError::Cancelled);
                    true
                }
                None => false,
            })
            .unwrap_or(false);

        debug!(
            user_id = %user_id,
            request_id = %request_id,
            cancelled = cancelled,
            "Cancel queued request"
        );
        cancelled
    }

    /// Reject every waiting request of a user with `QueueCleared`.
    ///
    /// Active requests keep their slots and must still be reported complete;
    /// the user's entry is dropped once it holds nothing. Returns the number
    /// of rejected requests.
    pub fn clear_user_queue(&self, user_id: &str) -> usize {
        let cleared = self
            .users()
            .with_existing(user_id, |state| {
                let drained = state.waiting.drain_all();
                for (_, entry) in &drained {
                    entry.events.reject(QueueError::QueueCleared);
                }
                drained.len()
            })
            .unwrap_or(0);

        if cleared > 0 {
            info!(user_id = %user_id, cleared = cleared, "User queue cleared");
        }
        cleared
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{admit, manager_with};
    use crate::application::RequestEvent;
    use crate::domain::{QueueConfig, QueueError, QueueStats};

    #[test]
    fn test_cancel_queued_once() {
        let config = QueueConfig::default().with_max_concurrent_per_user(1);
        let (manager, _clock) = manager_with(config);

        admit(&manager, "u1").unwrap();
        let mut r2 = admit(&manager, "u1").unwrap();

        assert!(manager.cancel_queued("u1", &r2.request_id));
        assert_eq!(r2.events.try_next(), Some(RequestEvent::Rejected(QueueError::Cancelled)));
        assert_eq!(manager.get_queue_stats("u1", Some(&r2.request_id)).position, None);

        assert!(!manager.cancel_queued("u1", &r2.request_id));
    }

    #[test]
    fn test_cancel_queued_ignores_active() {
        let (manager, _clock) = manager_with(QueueConfig::default());
        let r1 = admit(&manager, "u1").unwrap();

        assert!(!manager.cancel_queued("u1", &r1.request_id));
        assert_eq!(manager.get_queue_stats("u1", None).active_requests, 1);
    }

    #[test]
    fn test_cancel_keeps_order_of_others() {
        let config = QueueConfig::default().with_max_concurrent_per_user(1);
        let (manager, _clock) = manager_with(config);

        admit(&manager, "u1").unwrap();
        let r2 = admit(&manager, "u1").unwrap();
        let r3 = admit(&manager, "u1").unwrap();
        let r4 = admit(&manager, "u1").unwrap();

        manager.cancel_queued("u1", &r3.request_id);
        assert_eq!(manager.get_queue_stats("u1", Some(&r2.request_id)).position, Some(1));
        assert_eq!(manager.get_queue_stats("u1", Some(&r4.request_id)).position, Some(2));
    }

    #[test]
    fn test_clear_user_queue_keeps_active() {
        let config = QueueConfig::default().with_max_concurrent_per_user(1);
        let (manager, _clock) = manager_with(config);

        let r1 = admit(&manager, "u1").unwrap();
        let mut r2 = admit(&manager, "u1").unwrap();
        let mut r3 = admit(&manager, "u1").unwrap();
        let other = admit(&manager, "u2").unwrap();

        assert_eq!(manager.clear_user_queue("u1"), 2);
        assert_eq!(r2.events.try_next(), Some(RequestEvent::Rejected(QueueError::QueueCleared)));
        assert_eq!(r3.events.try_next(), Some(RequestEvent::Rejected(QueueError::QueueCleared)));
        assert_eq!(manager.get_queue_stats("u1", None), QueueStats::new(0, 1, None));
        assert_eq!(manager.get_queue_stats("u2", None), QueueStats::new(0, 1, None));

        assert!(manager.report_completion("u1", &r1.request_id));
        assert!(manager.report_completion("u2", &other.request_id));
        assert_eq!(manager.tracked_users(), 0);
    }

    #[test]
    fn test_clear_unknown_user() {
        let (manager, _clock) = manager_with(QueueConfig::default());
        assert_eq!(manager.clear_user_queue("ghost"), 0);
    }
}
