//! Runner backends
//!
//! A [`Runner`] executes one script or program for one job. Output lines are
//! pushed to the channel in the order the process writes them; the call
//! returns once the process has exited.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::RunnerError;

pub mod direct;
pub mod python;
pub mod r;

/// What to run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    /// Script name (interpreted runners) or program name (direct runner)
    pub target: String,
    pub args: Vec<String>,
    /// Interpreter pinned to the job, overriding the runner default
    pub interpreter: Option<String>,
    pub working_dir: Option<PathBuf>,
}

impl Invocation {
    /// Splits a job's argument list into target and remaining arguments
    pub fn from_args(args: &[String]) -> Option<Self> {
        let (target, rest) = args.split_first()?;
        Some(Self {
            target: target.clone(),
            args: rest.to_vec(),
            ..Self::default()
        })
    }

    pub fn with_interpreter(mut self, interpreter: Option<String>) -> Self {
        self.interpreter = interpreter.filter(|path| !path.is_empty());
        self
    }

    pub fn with_working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }
}

#[async_trait]
pub trait Runner: Send + Sync {
    /// Backend name used in logs
    fn name(&self) -> &'static str;

    /// Runs the invocation, streaming output lines into `output`
    async fn execute(
        &self,
        invocation: Invocation,
        output: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<(), RunnerError>;
}

// ===== Helper Functions =====

/// Absolute names are used as-is, relative ones are looked up under `dir`.
/// The result must exist.
fn resolve_script(dir: &Path, name: &str) -> Result<PathBuf, RunnerError> {
    let candidate = Path::new(name);
    let path = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        dir.join(candidate)
    };

    if !path.exists() {
        return Err(RunnerError::ScriptNotFound(path));
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_from_args() {
        let args = vec!["run.py".to_string(), "--fast".to_string(), "x".to_string()];
        let invocation = Invocation::from_args(&args).unwrap();
        assert_eq!(invocation.target, "run.py");
        assert_eq!(invocation.args, vec!["--fast", "x"]);

        assert!(Invocation::from_args(&[]).is_none());
    }

    #[test]
    fn test_empty_interpreter_is_ignored() {
        let invocation = Invocation::default().with_interpreter(Some(String::new()));
        assert!(invocation.interpreter.is_none());
    }

    #[test]
    fn test_resolve_script() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("analysis.py"), "").unwrap();

        let resolved = resolve_script(dir.path(), "analysis.py").unwrap();
        assert_eq!(resolved, dir.path().join("analysis.py"));

        let absolute = dir.path().join("analysis.py");
        let resolved = resolve_script(Path::new("/elsewhere"), absolute.to_str().unwrap()).unwrap();
        assert_eq!(resolved, absolute);

        let err = resolve_script(dir.path(), "missing.py").unwrap_err();
        assert!(err.to_string().starts_with("script not found: "));
    }
}
