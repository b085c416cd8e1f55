//! Job DTOs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::job::JobStatus;

/// Request to submit a new job
///
/// The interpreters are pinned from the active environments unless
/// explicit paths are given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJob {
    #[serde(rename = "type")]
    pub job_type: String,
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r_path: Option<String>,
}

/// Request to resubmit an existing job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RerunJob {
    /// Same interpreters as the original when `true`, otherwise the paths below
    #[serde(default = "default_true")]
    pub use_same_environment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r_path: Option<String>,
}

impl Default for RerunJob {
    fn default() -> Self {
        Self {
            use_same_environment: true,
            python_path: None,
            r_path: None,
        }
    }
}

/// Query string for listing jobs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    /// Case-insensitive substring of name or type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
}

fn default_true() -> bool {
    true
}
