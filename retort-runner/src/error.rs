//! Runner errors
//!
//! The `Display` text of these errors ends up verbatim in a failed job's
//! `error` field.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("script not found: {}", .0.display())]
    ScriptNotFound(PathBuf),

    #[error("failed to start program {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("process exited with status {0}")]
    ExitStatus(i32),

    #[error("process terminated by signal")]
    Terminated,

    #[error("execution cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] io::Error),
}
