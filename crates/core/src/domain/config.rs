// Queue Configuration (process-wide default, overridable per admission)

use crate::error::{AppError, Result};
use std::time::Duration;

/// Default number of requests a single user may have running at once
pub const DEFAULT_MAX_CONCURRENT_PER_USER: usize = 2;

/// Default number of requests a single user may have waiting
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 5;

/// Default lifetime of an admitted request (1 minute)
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Admission limits applied to one user's requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    pub max_concurrent_per_user: usize,
    pub max_queue_size: usize,
    pub request_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_per_user: DEFAULT_MAX_CONCURRENT_PER_USER,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl QueueConfig {
    pub fn new(
        max_concurrent_per_user: usize,
        max_queue_size: usize,
        request_timeout: Duration,
    ) -> Self {
        Self {
            max_concurrent_per_user,
            max_queue_size,
            request_timeout,
        }
    }

    pub fn with_max_concurrent_per_user(mut self, limit: usize) -> Self {
        self.max_concurrent_per_user = limit;
        self
    }

    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Request timeout in whole milliseconds
    pub fn request_timeout_ms(&self) -> u64 {
        self.request_timeout.as_millis() as u64
    }

    /// Reject limits that would park every request forever.
    ///
    /// A `max_queue_size` of zero is allowed: it turns the queue off and
    /// every request beyond the concurrency limit fails with `QueueFull`.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_per_user == 0 {
            return Err(AppError::Config(
                "max_concurrent_per_user must be at least 1".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(AppError::Config(
                "request_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
