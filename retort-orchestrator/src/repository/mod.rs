//! Repository Module
//!
//! Data access layer for the orchestrator. The scheduler only sees the
//! traits; the SQLite implementations live next to them.

pub mod environment;
pub mod job;

use thiserror::Error;

pub use environment::{EnvironmentRegistry, SqliteEnvironmentRegistry};
pub use job::{JobStore, SqliteJobStore};

/// Persistence failure
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("malformed row: {0}")]
    Corrupt(String),
}
