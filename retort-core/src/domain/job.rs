//! Job domain types
//!
//! A [`Job`] is the unit of work the orchestrator queues and executes. Its
//! status only moves forward through [`JobStatus::can_transition_to`]; the
//! single way back to `Pending` is the explicit [`Job::reset`] used when a job
//! is requeued.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::environment::EnvironmentBinding;

/// Parameter the scheduler copies into `output_path` once a job has run
pub const OUTPUT_DIR_PARAMETER: &str = "outputDir";

/// Error recorded on jobs claimed while the queue is in immediate-stop mode
pub const STOPPED_BY_USER: &str = "Job stopped by user request";

/// Error recorded on jobs whose process was interrupted through their cancellation token
pub const CANCELLED_BY_USER: &str = "Job cancelled by user request";

/// Error recorded by recovery on jobs left unfinished by a previous run
pub const INTERRUPTED_BY_SHUTDOWN: &str = "Job was interrupted by application shutdown";

/// Job execution record
///
/// Structure shared between the orchestrator (persists and mutates) and its
/// clients (display). Collection fields always serialize as lists/maps, never
/// as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub job_type: String,
    pub name: String,
    pub status: JobStatus,
    pub progress: f64,
    /// Selects the runner backend (`python`, `r`, `direct`)
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    /// Python interpreter pinned at submission time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_env: Option<EnvironmentBinding>,
    /// R interpreter pinned at submission time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r_env: Option<EnvironmentBinding>,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub terminal_output: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Job execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// Rejected status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid job transition from {from} to {to}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

impl JobStatus {
    /// Stable storage/wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Forward transitions a worker may perform.
    ///
    /// Going back to `Pending` is not a transition; it is a reset and only
    /// happens through [`Job::reset`].
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::InProgress)
                | (JobStatus::InProgress, JobStatus::Completed)
                | (JobStatus::InProgress, JobStatus::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "in_progress" => Ok(JobStatus::InProgress),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

impl Job {
    /// Creates a new pending job with no output and zero progress
    pub fn new(
        job_type: impl Into<String>,
        name: impl Into<String>,
        command: impl Into<String>,
        args: Vec<String>,
        parameters: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_type: job_type.into(),
            name: name.into(),
            status: JobStatus::Pending,
            progress: 0.0,
            command: command.into(),
            args,
            parameters,
            python_env: None,
            r_env: None,
            output_path: None,
            terminal_output: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// Pins the interpreters this job will be validated against and run with
    pub fn with_environments(
        mut self,
        python_env: Option<EnvironmentBinding>,
        r_env: Option<EnvironmentBinding>,
    ) -> Self {
        self.python_env = python_env;
        self.r_env = r_env;
        self
    }

    /// Pending -> InProgress, stamping `started_at`
    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.transition(JobStatus::InProgress)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// InProgress -> Completed at 100%
    pub fn complete(&mut self) -> Result<(), TransitionError> {
        self.transition(JobStatus::Completed)?;
        self.progress = 100.0;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// InProgress -> Failed with a human-readable cause
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Fails a job that a previous process left Pending or InProgress.
    ///
    /// Recovery-only: unlike [`Job::fail`] it also accepts `Pending`, since
    /// no worker will ever claim such a job again.
    pub fn mark_interrupted(&mut self) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError {
                from: self.status,
                to: JobStatus::Failed,
            });
        }
        self.status = JobStatus::Failed;
        self.error = Some(INTERRUPTED_BY_SHUTDOWN.to_string());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Puts the job back to a freshly-submitted state so it can be requeued.
    ///
    /// Identity, request fields, pinned environments and `created_at` are kept.
    pub fn reset(&mut self) {
        self.status = JobStatus::Pending;
        self.progress = 0.0;
        self.error = None;
        self.started_at = None;
        self.completed_at = None;
        self.terminal_output.clear();
    }

    /// Appends one captured output line
    pub fn append_output(&mut self, line: impl Into<String>) {
        self.terminal_output.push(line.into());
    }

    /// Sets progress, clamped to `[0, 100]`
    pub fn set_progress(&mut self, progress: f64) {
        self.progress = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 100.0)
        };
    }

    /// `parameters["outputDir"]` when it is a non-empty string
    pub fn output_dir(&self) -> Option<&str> {
        self.parameters
            .get(OUTPUT_DIR_PARAMETER)
            .and_then(|value| value.as_str())
            .filter(|dir| !dir.is_empty())
    }

    /// Copies the output directory parameter into `output_path`
    pub fn record_output_path(&mut self) {
        if let Some(dir) = self.output_dir() {
            self.output_path = Some(dir.to_string());
        }
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new("pca", "PCA run", "python", vec![], HashMap::new())
    }

    #[test]
    fn test_new_job_is_pending_and_empty() {
        let job = job();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0.0);
        assert!(job.args.is_empty());
        assert!(job.terminal_output.is_empty());
        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_none());
        assert!(job.error.is_none());
    }

    #[test]
    fn test_empty_collections_serialize_as_lists() {
        let value = serde_json::to_value(job()).unwrap();
        assert_eq!(value["args"], serde_json::json!([]));
        assert_eq!(value["terminalOutput"], serde_json::json!([]));
        assert_eq!(value["parameters"], serde_json::json!({}));
        assert_eq!(value["status"], "pending");
        assert_eq!(value["type"], "pca");
    }

    #[test]
    fn test_forward_lifecycle() {
        let mut job = job();
        job.start().unwrap();
        assert_eq!(job.status, JobStatus::InProgress);
        assert!(job.started_at.is_some());

        job.complete().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100.0);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_fail_requires_in_progress() {
        let mut job = job();
        let err = job.fail("boom").unwrap_err();
        assert_eq!(err.from, JobStatus::Pending);
        assert_eq!(err.to, JobStatus::Failed);

        job.start().unwrap();
        job.fail("boom").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_terminal_states_do_not_move() {
        let mut job = job();
        job.start().unwrap();
        job.complete().unwrap();

        assert!(job.start().is_err());
        assert!(job.fail("late").is_err());
        assert!(job.mark_interrupted().is_err());
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn test_reset_clears_run_state_but_keeps_identity() {
        let mut job = job();
        let id = job.id;
        let created_at = job.created_at;
        job.start().unwrap();
        job.append_output("line");
        job.set_progress(40.0);
        job.fail("boom").unwrap();

        job.reset();

        assert_eq!(job.id, id);
        assert_eq!(job.created_at, created_at);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0.0);
        assert!(job.error.is_none());
        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_none());
        assert!(job.terminal_output.is_empty());
    }

    #[test]
    fn test_mark_interrupted_accepts_pending_and_in_progress() {
        let mut pending = job();
        pending.mark_interrupted().unwrap();
        assert_eq!(pending.status, JobStatus::Failed);
        assert_eq!(pending.error.as_deref(), Some(INTERRUPTED_BY_SHUTDOWN));
        assert!(pending.completed_at.is_some());

        let mut running = job();
        running.start().unwrap();
        running.mark_interrupted().unwrap();
        assert_eq!(running.status, JobStatus::Failed);
    }

    #[test]
    fn test_progress_is_clamped() {
        let mut job = job();
        job.set_progress(150.0);
        assert_eq!(job.progress, 100.0);
        job.set_progress(-3.0);
        assert_eq!(job.progress, 0.0);
        job.set_progress(f64::NAN);
        assert_eq!(job.progress, 0.0);
    }

    #[test]
    fn test_output_path_from_parameters() {
        let mut job = job();
        job.record_output_path();
        assert!(job.output_path.is_none());

        job.parameters
            .insert(OUTPUT_DIR_PARAMETER.to_string(), serde_json::json!(""));
        job.record_output_path();
        assert!(job.output_path.is_none());

        job.parameters
            .insert(OUTPUT_DIR_PARAMETER.to_string(), serde_json::json!("/tmp/out"));
        job.record_output_path();
        assert_eq!(job.output_path.as_deref(), Some("/tmp/out"));
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            JobStatus::Pending,
            JobStatus::InProgress,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("queued".parse::<JobStatus>().is_err());
    }
}
