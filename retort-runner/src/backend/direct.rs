//! Direct program backend
//!
//! Runs an executable without an interpreter. Program names resolve as
//! follows:
//! - absolute paths are used as-is
//! - names with an extension are looked up in the bin directory
//! - bare names are searched on `PATH`, falling back to the bin directory

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{Invocation, Runner};
use crate::config::RunnerConfig;
use crate::error::RunnerError;
use crate::process::stream_command;

pub struct DirectRunner {
    bin_dir: PathBuf,
}

impl DirectRunner {
    pub fn new(bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin_dir: bin_dir.into(),
        }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(config.bin_dir.clone())
    }

    fn resolve_program(&self, program: &str) -> PathBuf {
        let candidate = Path::new(program);

        let path = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else if candidate.extension().is_some() {
            self.bin_dir.join(candidate)
        } else {
            which::which(program).unwrap_or_else(|_| self.bin_dir.join(candidate))
        };

        std::path::absolute(&path).unwrap_or(path)
    }
}

#[async_trait]
impl Runner for DirectRunner {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn execute(
        &self,
        invocation: Invocation,
        output: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<(), RunnerError> {
        let program = self.resolve_program(&invocation.target);

        info!("Running {}", program.display());

        let mut command = Command::new(&program);
        command.args(&invocation.args);
        if let Some(dir) = &invocation.working_dir {
            command.current_dir(dir);
        }

        stream_command(command, &output, &cancel).await
    }
}
