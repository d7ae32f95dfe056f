// Central Error Type for the Library

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Queue error: {0}")]
    Queue(#[from] crate::domain::QueueError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// The delivered queue outcome, if this error carries one
    pub fn as_queue_error(&self) -> Option<&crate::domain::QueueError> {
        match self {
            AppError::Queue(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
