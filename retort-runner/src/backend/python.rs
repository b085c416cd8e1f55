//! Python backend

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

/// Runs `<interpreter> <script> args...`
pub struct PythonRunner {
    python_path: String,
    script_dir: PathBuf,
}

impl PythonRunner {
    pub fn new(python_path: impl Into<String>, script_dir: impl Into<PathBuf>) -> Self {
        Self {
            python_path: python_path.into(),
            script_dir: script_dir.into(),
        }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(config.python_path.clone(), config.python_script_dir.clone())
    }
}

#[async_trait]
impl Runner for PythonRunner {
    fn name(&self) -> &'static str {
        "python"
    }

    async fn execute(
        &self,
        invocation: Invocation,
        output: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<(), RunnerError> {
        let script = resolve_script(&self.script_dir, &invocation.target)?;
        let interpreter = invocation
            .interpreter
            .unwrap_or_else(|| self.python_path.clone());

        info!("Running {} with {}", script.display(), interpreter);

        let mut command = Command::new(&interpreter);
        command.arg(&script).args(&invocation.args);
        if let Some(dir) = &invocation.working_dir {
            command.current_dir(dir);
        }

        stream_command(command, &output, &cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_runs_script_with_pinned_interpreter() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.sh"), "echo \"hello $1\"\n").unwrap();

        // /bin/sh stands in for the interpreter
        let runner = PythonRunner::new("/nonexistent/python", dir.path());
        let invocation = Invocation::from_args(&["hello.sh".to_string(), "world".to_string()])
            .unwrap()
            .with_interpreter(Some("/bin/sh".to_string()));

        let (tx, mut rx) = mpsc::channel(8);
        runner
            .execute(invocation, tx, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(rx.recv().await.as_deref(), Some("hello world"));
    }

    #[tokio::test]
    async fn test_missing_script() {
        let dir = tempfile::tempdir().unwrap();
        let runner = PythonRunner::new("/bin/sh", dir.path());
        let invocation = Invocation::from_args(&["absent.py".to_string()]).unwrap();

        let (tx, _rx) = mpsc::channel(8);
        let err = runner
            .execute(invocation, tx, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::ScriptNotFound(_)));
    }
}
