//! Data Transfer Objects for client/orchestrator communication
//!
//! Request and event payloads exchanged over the HTTP API. Domain entities
//! (jobs, environments, queue status) travel as-is; these types cover the
//! shapes that only exist on the wire.

pub mod environment;
pub mod event;
pub mod job;
pub mod queue;
pub mod recovery;
