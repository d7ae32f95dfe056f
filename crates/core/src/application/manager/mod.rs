//! Queue Manager - per-user admission control with a bounded FIFO queue
//!
//! Decides whether an agent request runs now or waits, reclaims capacity on
//! completion, and evicts requests that outlive their timeout.
//!
//! All operations are synchronous and never wait for a future promotion; the
//! caller observes promotion through the `RequestEvents` returned with the
//! admission.

mod cancellation;
mod completion;
mod expiry;

pub use expiry::SweepReport;

use super::events::{event_channel, RequestEvents};
use super::store::{ActiveSlot, UserSnapshot, UserStateStore, WaitingEntry};
use super::timer::TimeoutTimer;
use crate::domain::{
    derive_request_id, queue_message, AgentId, QueueConfig, QueueError, QueueStats, RequestId,
    RequestParams, RequestRecord, UserId,
};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, SystemTimeProvider, TimeProvider, UuidProvider};
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Input of `request_admission`
#[derive(Debug, Clone)]
pub struct AdmissionRequest {
    pub user_id: UserId,
    pub agent_id: AgentId,
    pub params: RequestParams,
    pub cancellation: Option<CancellationToken>,
    /// Overrides the manager's default limits for this request
    pub config: Option<QueueConfig>,
}

impl AdmissionRequest {
    pub fn new(
        user_id: impl Into<String>,
        agent_id: impl Into<String>,
        params: RequestParams,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            agent_id: agent_id.into(),
            params,
            cancellation: None,
            config: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_config(mut self, config: QueueConfig) -> Self {
        self.config = Some(config);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(AppError::Validation("user_id cannot be empty".to_string()));
        }
        if self.agent_id.trim().is_empty() {
            return Err(AppError::Validation("agent_id cannot be empty".to_string()));
        }
        Ok(())
    }
}

/// Outcome of a successful admission decision
#[derive(Debug)]
pub struct Admission {
    pub request_id: RequestId,
    /// `true`: run now. `false`: queued, wait for `RequestEvent::Started`.
    pub can_execute: bool,
    pub events: RequestEvents,
}

struct Inner {
    users: UserStateStore,
    default_config: QueueConfig,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
}

/// Per-user admission controller and queue.
///
/// Cheap to clone; clones share state. Create one per process in production
/// and one per test.
#[derive(Clone)]
pub struct QueueManager {
    inner: Arc<Inner>,
}

/// Non-owning handle used by timer tasks
pub(crate) struct WeakQueueManager {
    inner: Weak<Inner>,
}

impl WeakQueueManager {
    pub(crate) fn upgrade(&self) -> Option<QueueManager> {
        self.inner.upgrade().map(|inner| QueueManager { inner })
    }
}

impl QueueManager {
    /// Create a manager with injected clock and ID source
    pub fn new(
        default_config: QueueConfig,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Result<Self> {
        default_config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                users: UserStateStore::new(),
                default_config,
                time_provider,
                id_provider,
            }),
        })
    }

    /// Production wiring: system clock, UUID salts
    pub fn with_config(default_config: QueueConfig) -> Result<Self> {
        Self::new(
            default_config,
            Arc::new(SystemTimeProvider),
            Arc::new(UuidProvider),
        )
    }

    pub fn default_config(&self) -> &QueueConfig {
        &self.inner.default_config
    }

    pub(crate) fn downgrade(&self) -> WeakQueueManager {
        WeakQueueManager {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn now_millis(&self) -> i64 {
        self.inner.time_provider.now_millis()
    }

    fn users(&self) -> &UserStateStore {
        &self.inner.users
    }

    /// Decide whether a request runs now or waits.
    ///
    /// - Free slot: the request becomes active, `can_execute = true`.
    /// - No slot, queue full: `QueueFull`, nothing changes.
    /// - Otherwise: appended to the user's queue, `can_execute = false`.
    ///
    /// A timeout timer is armed in both granted and queued cases.
    pub fn request_admission(&self, request: AdmissionRequest) -> Result<Admission> {
        request.validate()?;
        let config = request.config.unwrap_or(self.inner.default_config);
        config.validate()?;

        let now = self.now_millis();
        let salt = self.inner.id_provider.generate_id();
        let request_id = derive_request_id(&request.user_id, &request.agent_id, now, &salt);
        let record = RequestRecord::new(
            request_id.clone(),
            request.user_id,
            request.agent_id,
            request.params,
            request.cancellation,
            now,
        );

        if record.is_cancelled() {
            debug!(request_id = %request_id, "Refusing admission of cancelled request");
            return Err(QueueError::Cancelled.into());
        }

        let (events_tx, events) = event_channel();
        let user_id = record.user_id.clone();

        let can_execute = self.users().with_user(&user_id, |state| -> Result<bool> {
            if state.holds(&request_id) {
                warn!(
                    user_id = %user_id,
                    request_id = %request_id,
                    "Request ID already in use"
                );
                return Err(AppError::Validation(format!(
                    "request {} already exists",
                    request_id
                )));
            }

            // Earlier arrivals take any free slot first
            state.promote_waiting(now);

            if state.active.len() < config.max_concurrent_per_user {
                let timer = TimeoutTimer::arm(self, &user_id, &request_id, config.request_timeout);
                let active = record.start(now);
                events_tx.started(now);
                state.active.insert(
                    request_id.clone(),
                    ActiveSlot {
                        request: active,
                        config,
                        events: events_tx,
                        timer,
                    },
                );
                debug!(
                    user_id = %user_id,
                    request_id = %request_id,
                    active = state.active.len(),
                    "Request admitted"
                );
                return Ok(true);
            }

            if state.waiting.len() >= config.max_queue_size {
                warn!(
                    user_id = %user_id,
                    request_id = %request_id,
                    max_queue_size = config.max_queue_size,
                    "Queue full, request rejected"
                );
                return Err(QueueError::QueueFull {
                    max_queue_size: config.max_queue_size,
                }
                .into());
            }

            let timer = TimeoutTimer::arm(self, &user_id, &request_id, config.request_timeout);
            let entry = WaitingEntry {
                record,
                config,
                events: events_tx,
                timer,
            };
            state
                .waiting
                .enqueue(request_id.clone(), entry, config.max_queue_size)?;
            debug!(
                user_id = %user_id,
                request_id = %request_id,
                position = state.waiting.len(),
                "Request queued"
            );
            Ok(false)
        })?;

        Ok(Admission {
            request_id,
            can_execute,
            events,
        })
    }

    /// Queue statistics for a user, with the 1-based position of
    /// `request_id` when it is waiting
    pub fn get_queue_stats(&self, user_id: &str, request_id: Option<&str>) -> QueueStats {
        self.users()
            .read(user_id, |state| {
                QueueStats::new(
                    state.waiting.len(),
                    state.active.len(),
                    request_id.and_then(|id| state.waiting.position_of(id)),
                )
            })
            .unwrap_or_default()
    }

    /// Formatted status line for UI (see `domain::queue_message`)
    pub fn get_queue_message(stats: &QueueStats) -> Option<String> {
        queue_message(stats)
    }

    /// Summary of every user with queued or active requests, sorted by user
    pub fn snapshot(&self) -> Vec<UserSnapshot> {
        self.users().snapshot()
    }

    /// Number of users with any bookkeeping entry
    pub fn tracked_users(&self) -> usize {
        self.users().len()
    }
}
