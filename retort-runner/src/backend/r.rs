//! R backend

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{Invocation, Runner, resolve_script};
use crate::config::RunnerConfig;
use crate::error::RunnerError;
use crate::process::stream_command;

/// Runs `Rscript <script> args...`, exporting `R_LIBS` when configured
pub struct RRunner {
    rscript_path: String,
    r_libs: Option<String>,
    script_dir: PathBuf,
}

impl RRunner {
    pub fn new(rscript_path: impl Into<String>, script_dir: impl Into<PathBuf>) -> Self {
        Self {
            rscript_path: rscript_path.into(),
            r_libs: None,
            script_dir: script_dir.into(),
        }
    }

    pub fn with_r_libs(mut self, r_libs: Option<String>) -> Self {
        self.r_libs = r_libs;
        self
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(config.rscript_path.clone(), config.r_script_dir.clone())
            .with_r_libs(config.r_libs.clone())
    }
}

#[async_trait]
impl Runner for RRunner {
    fn name(&self) -> &'static str {
        "r"
    }

    async fn execute(
        &self,
        invocation: Invocation,
        output: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<(), RunnerError> {
        let script = resolve_script(&self.script_dir, &invocation.target)?;
        let rscript = invocation
            .interpreter
            .unwrap_or_else(|| self.rscript_path.clone());

        info!("Running {} with {}", script.display(), rscript);

        let mut command = Command::new(&rscript);
        command.arg(&script).args(&invocation.args);
        if let Some(libs) = &self.r_libs {
            command.env("R_LIBS", libs);
        }
        if let Some(dir) = &invocation.working_dir {
            command.current_dir(dir);
        }

        stream_command(command, &output, &cancel).await
    }
}
