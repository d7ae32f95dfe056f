// Queue Statistics & presentation messages

use serde::{Deserialize, Serialize};

/// Point-in-time view of one user's queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub queued_requests: usize,
    pub active_requests: usize,
    /// 1-based rank in the waiting list; `None` when not asked for or not queued
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

impl QueueStats {
    pub fn new(queued_requests: usize, active_requests: usize, position: Option<usize>) -> Self {
        Self {
            queued_requests,
            active_requests,
            position,
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// Human-readable queue status for UI, `None` when nothing is queued
pub fn queue_message(stats: &QueueStats) -> Option<String> {
    if stats.queued_requests == 0 {
        return None;
    }

    if let Some(position) = stats.position {
        let ahead = position.saturating_sub(1);
        if ahead == 0 {
            return Some("Next in queue...".to_string());
        }
        return Some(format!("{} request{} ahead in queue", ahead, plural(ahead)));
    }

    Some(format!(
        "{} request{} in queue",
        stats.queued_requests,
        plural(stats.queued_requests)
    ))
}
