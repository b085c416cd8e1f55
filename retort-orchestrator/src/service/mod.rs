//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services orchestrate between repositories and runners and own the
//! scheduling rules.

pub mod environment;
pub mod events;
pub mod job_queue;
pub mod recovery;

// Re-export for convenience
pub use environment as environment_service;
pub use events::{BroadcastEventSink, EventSink, TracingEventSink};
pub use job_queue::{JobQueue, QueueConfig, QueueError};
pub use recovery::{FixedRecoveryPrompt, RecoveryCoordinator, RecoveryPrompt};
