// Request Domain Model

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Request ID (derived from user, agent, admission time and a random salt)
pub type RequestId = String;

/// User identifier (owner of the per-user limits)
pub type UserId = String;

/// Agent identifier (target of the request, never interpreted here)
pub type AgentId = String;

/// Opaque request parameters, carried but never inspected by the queue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestParams(serde_json::Value);

impl RequestParams {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Build a request ID from its parts: `{user}-{agent}-{enqueued_at}-{salt}`
pub fn derive_request_id(user_id: &str, agent_id: &str, enqueued_at: i64, salt: &str) -> RequestId {
    format!("{}-{}-{}-{}", user_id, agent_id, enqueued_at, salt)
}

/// One unit of work as submitted for admission.
///
/// Immutable once created; it only ever moves between collections.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub id: RequestId,
    pub user_id: UserId,
    pub agent_id: AgentId,
    pub params: RequestParams,
    pub cancellation: Option<CancellationToken>,
    pub enqueued_at: i64, // epoch ms
}

impl RequestRecord {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        agent_id: impl Into<String>,
        params: RequestParams,
        cancellation: Option<CancellationToken>,
        enqueued_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            agent_id: agent_id.into(),
            params,
            cancellation,
            enqueued_at,
        }
    }

    /// True once the caller's cancellation token has fired
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Milliseconds since admission, never negative
    pub fn age_millis(&self, now_millis: i64) -> u64 {
        now_millis.saturating_sub(self.enqueued_at).max(0) as u64
    }

    /// Transition to running with explicit timestamp
    pub fn start(&self, now_millis: i64) -> ActiveRequest {
        ActiveRequest {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            agent_id: self.agent_id.clone(),
            admitted_at: self.enqueued_at,
            started_at: now_millis,
        }
    }
}

/// A request currently counted against its user's concurrency limit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveRequest {
    pub id: RequestId,
    pub user_id: UserId,
    pub agent_id: AgentId,
    pub admitted_at: i64, // epoch ms
    pub started_at: i64,  // epoch ms
}

impl ActiveRequest {
    /// Milliseconds since admission (waiting time included)
    pub fn age_millis(&self, now_millis: i64) -> u64 {
        now_millis.saturating_sub(self.admitted_at).max(0) as u64
    }
}
