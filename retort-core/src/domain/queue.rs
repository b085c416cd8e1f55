//! Queue control state
//!
//! The scheduler is in exactly one of three modes. `PausedImmediateStop` is
//! a paused mode in which workers keep draining the backlog but fail every
//! job they claim instead of running it.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlState {
    #[default]
    Running,
    Paused,
    PausedImmediateStop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("queue is already paused")]
    AlreadyPaused,

    #[error("queue is not paused")]
    NotPaused,
}

impl ControlState {
    /// Running -> Paused
    pub fn pause(self) -> Result<Self, ControlError> {
        match self {
            ControlState::Running => Ok(ControlState::Paused),
            _ => Err(ControlError::AlreadyPaused),
        }
    }

    /// Any state -> PausedImmediateStop
    pub fn stop_immediate(self) -> Self {
        ControlState::PausedImmediateStop
    }

    /// Paused or PausedImmediateStop -> Running
    pub fn resume(self) -> Result<Self, ControlError> {
        match self {
            ControlState::Running => Err(ControlError::NotPaused),
            _ => Ok(ControlState::Running),
        }
    }

    pub fn is_paused(&self) -> bool {
        !matches!(self, ControlState::Running)
    }

    pub fn is_stop_immediate(&self) -> bool {
        matches!(self, ControlState::PausedImmediateStop)
    }

    /// Whether a worker may take the next job off the backlog
    pub fn admits_work(&self) -> bool {
        !matches!(self, ControlState::Paused)
    }
}

/// Snapshot of the scheduler, as reported to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub paused: bool,
    pub stop_immediate: bool,
    /// Jobs a worker is currently processing
    pub in_flight: Vec<Uuid>,
    /// Persisted jobs in `pending`
    pub pending_count: u64,
    /// Persisted jobs in `in_progress`
    pub in_progress_count: u64,
    /// Ids waiting in the bounded backlog
    pub backlog: usize,
}

impl QueueStatus {
    /// First in-flight job, kept for single-job displays
    pub fn current_job(&self) -> Option<Uuid> {
        self.in_flight.first().copied()
    }
}
