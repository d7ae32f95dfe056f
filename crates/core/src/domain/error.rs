// Domain Error Types - outcomes delivered to the caller of request_admission

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a request left the queue without being completed by its caller.
///
/// Every variant is delivered to the original caller (either as the error of
/// `request_admission` or through its `RequestEvents`), never raised anywhere
/// else.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueError {
    #[error("Queue full. Maximum {max_queue_size} requests can be queued. Please try again later.")]
    QueueFull { max_queue_size: usize },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Request expired after waiting {age_ms}ms")]
    Expired { age_ms: u64 },

    #[error("Queue cleared")]
    QueueCleared,
}

impl QueueError {
    /// True for the two time-based evictions (per-request timer or sweep)
    pub fn is_timeout(&self) -> bool {
        matches!(self, QueueError::Timeout { .. } | QueueError::Expired { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_full_message_includes_limit() {
        let err = QueueError::QueueFull { max_queue_size: 5 };
        assert!(err.to_string().contains("Maximum 5 requests"));
    }

    #[test]
    fn test_timeout_and_expired_are_time_based() {
        assert!(QueueError::Timeout { timeout_ms: 50 }.is_timeout());
        assert!(QueueError::Expired { age_ms: 51 }.is_timeout());
        assert!(!QueueError::Cancelled.is_timeout());
        assert!(!QueueError::QueueCleared.is_timeout());
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let json = serde_json::to_value(QueueError::QueueFull { max_queue_size: 1 }).unwrap();
        assert_eq!(json["kind"], "QUEUE_FULL");
        assert_eq!(json["max_queue_size"], 1);
    }
}
