//! Interpreter environments
//!
//! An [`Environment`] is a registered Python or R installation. At most one
//! environment per kind is active; the active ones are what new jobs get
//! pinned to through an [`EnvironmentBinding`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentKind {
    Python,
    R,
}

impl EnvironmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentKind::Python => "python",
            EnvironmentKind::R => "r",
        }
    }
}

impl std::fmt::Display for EnvironmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EnvironmentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "python" => Ok(EnvironmentKind::Python),
            "r" => Ok(EnvironmentKind::R),
            other => Err(format!("unknown environment kind '{}'", other)),
        }
    }
}

/// Registered interpreter installation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub kind: EnvironmentKind,
    pub name: String,
    /// Interpreter executable; unique per kind
    pub path: String,
    /// Flavour label, e.g. `venv`, `conda`, `system`
    #[serde(rename = "type")]
    pub env_type: String,
    #[serde(default)]
    pub version: Option<String>,
    pub is_active: bool,
}

impl Environment {
    pub fn binding(&self) -> EnvironmentBinding {
        EnvironmentBinding {
            path: self.path.clone(),
            env_type: self.env_type.clone(),
        }
    }
}

/// Interpreter reference stored on a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentBinding {
    pub path: String,
    #[serde(rename = "type")]
    pub env_type: String,
}

impl EnvironmentBinding {
    pub fn new(path: impl Into<String>, env_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            env_type: env_type.into(),
        }
    }
}
