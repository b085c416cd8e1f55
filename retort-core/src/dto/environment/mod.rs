//! Environment registry DTOs

use serde::{Deserialize, Serialize};

use crate::domain::environment::EnvironmentKind;

/// Request to add (or update, keyed by kind and path) an interpreter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterEnvironment {
    pub kind: EnvironmentKind,
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub env_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Make it the active environment of its kind
    #[serde(default)]
    pub activate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivateEnvironment {
    pub kind: EnvironmentKind,
    pub path: String,
}
