// Agent Queue Core - Domain Logic & Ports
// NO infrastructure dependencies (hexagonal architecture)

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use application::{Admission, AdmissionRequest, QueueManager, RequestEvent, RequestEvents};
pub use domain::{queue_message, QueueConfig, QueueError, QueueStats};
pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
