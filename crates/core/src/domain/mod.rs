// Domain Layer - Pure business logic and entities

pub mod config;
pub mod error;
pub mod queue;
pub mod request;
pub mod stats;

// Re-exports
pub use config::QueueConfig;
pub use error::QueueError;
pub use queue::WaitingQueue;
pub use request::{
    derive_request_id, ActiveRequest, AgentId, RequestId, RequestParams, RequestRecord, UserId,
};
pub use stats::{queue_message, QueueStats};
