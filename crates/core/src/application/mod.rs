// Application Layer - Use Cases and Business Logic

mod events;
pub mod manager;
mod store;
pub mod sweeper;
mod timer;

// Re-exports
pub use events::{RequestEvent, RequestEvents};
pub use manager::{Admission, AdmissionRequest, QueueManager, SweepReport};
pub use store::UserSnapshot;
pub use sweeper::{ExpirySweeper, DEFAULT_SWEEP_INTERVAL};
