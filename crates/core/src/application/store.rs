// Per-User State Store
//
// One entry per user, created on first admission and removed as soon as it
// holds neither waiting nor active requests. Every mutation of one user's
// state runs under that entry's write guard.

use super::events::EventSender;
use super::timer::TimeoutTimer;
use crate::domain::{
    ActiveRequest, QueueConfig, QueueError, RequestId, RequestRecord, UserId, WaitingQueue,
};
use dashmap::DashMap;
use std::collections::HashMap;
use tracing::{debug, info};

/// A request waiting for a slot
pub(crate) struct WaitingEntry {
    pub(crate) record: RequestRecord,
    pub(crate) config: QueueConfig,
    pub(crate) events: EventSender,
    pub(crate) timer: Option<TimeoutTimer>,
}

/// A request holding a slot
pub(crate) struct ActiveSlot {
    pub(crate) request: ActiveRequest,
    pub(crate) config: QueueConfig,
    pub(crate) events: EventSender,
    // Held only so that dropping the slot disarms the timer
    #[allow(dead_code)]
    pub(crate) timer: Option<TimeoutTimer>,
}

impl WaitingEntry {
    /// Move into the active set, keeping the timer armed at admission
    fn activate(self, now_millis: i64) -> ActiveSlot {
        let request = self.record.start(now_millis);
        self.events.started(now_millis);
        ActiveSlot {
            request,
            config: self.config,
            events: self.events,
            timer: self.timer,
        }
    }
}

#[derive(Default)]
pub(crate) struct UserQueueState {
    pub(crate) waiting: WaitingQueue<WaitingEntry>,
    pub(crate) active: HashMap<RequestId, ActiveSlot>,
}

impl UserQueueState {
    pub(crate) fn is_idle(&self) -> bool {
        self.waiting.is_empty() && self.active.is_empty()
    }

    /// Whether `request_id` is waiting or active
    pub(crate) fn holds(&self, request_id: &str) -> bool {
        self.active.contains_key(request_id) || self.waiting.position_of(request_id).is_some()
    }

    /// Fill free capacity from the head of the waiting list, in arrival order.
    ///
    /// Entries whose cancellation token has fired are rejected with
    /// `Cancelled` and skipped without using a slot. Returns the IDs of the
    /// promoted requests.
    pub(crate) fn promote_waiting(&mut self, now_millis: i64) -> Vec<RequestId> {
        let mut promoted = Vec::new();

        loop {
            let head_cancelled = match self.waiting.peek() {
                Some((_, head)) => head.record.is_cancelled(),
                None => break,
            };

            if head_cancelled {
                if let Some((id, entry)) = self.waiting.dequeue_next() {
                    debug!(
                        user_id = %entry.record.user_id,
                        request_id = %id,
                        "Skipping cancelled request at head of queue"
                    );
                    entry.events.reject(QueueError::Cancelled);
                }
                continue;
            }

            let limit = match self.waiting.peek() {
                Some((_, head)) => head.config.max_concurrent_per_user,
                None => break,
            };
            if self.active.len() >= limit {
                break;
            }

            let Some((id, entry)) = self.waiting.dequeue_next() else {
                break;
            };
            let waited_ms = entry.record.age_millis(now_millis);
            info!(
                user_id = %entry.record.user_id,
                request_id = %id,
                waited_ms = waited_ms,
                "Promoted queued request"
            );
            self.active.insert(id.clone(), entry.activate(now_millis));
            promoted.push(id);
        }

        promoted
    }
}

/// Read-only summary of one user's state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSnapshot {
    pub user_id: UserId,
    pub queued: usize,
    pub active: usize,
}

/// Process-wide table from user to that user's queue state
#[derive(Default)]
pub(crate) struct UserStateStore {
    users: DashMap<UserId, UserQueueState>,
}

impl UserStateStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Mutate a user's state, creating it on first use
    pub(crate) fn with_user<R>(
        &self,
        user_id: &str,
        f: impl FnOnce(&mut UserQueueState) -> R,
    ) -> R {
        let result = {
            let mut state = self.users.entry(user_id.to_string()).or_default();
            f(state.value_mut())
        };
        self.prune(user_id);
        result
    }

    /// Mutate a user's state only if it exists
    pub(crate) fn with_existing<R>(
        &self,
        user_id: &str,
        f: impl FnOnce(&mut UserQueueState) -> R,
    ) -> Option<R> {
        let result = {
            let mut state = self.users.get_mut(user_id)?;
            f(state.value_mut())
        };
        self.prune(user_id);
        Some(result)
    }

    pub(crate) fn read<R>(&self, user_id: &str, f: impl FnOnce(&UserQueueState) -> R) -> Option<R> {
        self.users.get(user_id).map(|state| f(state.value()))
    }

    pub(crate) fn user_ids(&self) -> Vec<UserId> {
        self.users.iter().map(|entry| entry.key().clone()).collect()
    }

    pub(crate) fn snapshot(&self) -> Vec<UserSnapshot> {
        let mut snapshot: Vec<UserSnapshot> = self
            .users
            .iter()
            .map(|entry| UserSnapshot {
                user_id: entry.key().clone(),
                queued: entry.waiting.len(),
                active: entry.active.len(),
            })
            .collect();
        snapshot.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        snapshot
    }

    pub(crate) fn len(&self) -> usize {
        self.users.len()
    }

    // Atomic with respect to other writers of the same entry
    fn prune(&self, user_id: &str) {
        self.users.remove_if(user_id, |_, state| state.is_idle());
    }
}
