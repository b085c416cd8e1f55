//! Startup recovery DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::job::Job;

/// What to do with jobs a previous run left unfinished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Reset to pending and requeue
    Restart,
    /// Fail with the interrupted-by-shutdown error
    MarkFailed,
    /// Touch nothing
    LeaveAsIs,
}

impl RecoveryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryAction::Restart => "restart",
            RecoveryAction::MarkFailed => "mark_failed",
            RecoveryAction::LeaveAsIs => "leave_as_is",
        }
    }
}

impl std::fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecoveryAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "restart" => Ok(RecoveryAction::Restart),
            "fail" | "mark_failed" => Ok(RecoveryAction::MarkFailed),
            "leave" | "leave_as_is" => Ok(RecoveryAction::LeaveAsIs),
            other => Err(format!("unknown recovery action '{}'", other)),
        }
    }
}

/// Request to apply an action to the currently stale jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyRecovery {
    pub action: RecoveryAction,
}

/// Outcome of a recovery pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryReport {
    pub action: Option<RecoveryAction>,
    /// Unfinished jobs found
    pub found: Vec<Job>,
    /// Jobs the action was applied to
    pub applied: Vec<Uuid>,
    /// Jobs whose update could not be persisted
    pub skipped: Vec<Uuid>,
}
