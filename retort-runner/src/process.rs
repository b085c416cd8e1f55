//! Child process streaming
//!
//! Spawns a prepared command with both pipes captured and forwards each
//! line to an output channel while the process runs. Lines from stderr are
//! prefixed with [`STDERR_PREFIX`].

use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::RunnerError;

/// Marker put in front of every stderr line
pub const STDERR_PREFIX: &str = "[ERROR] ";

/// How long output is still read after the process exits
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Runs `command` to completion, forwarding its output line by line.
///
/// Returns `Ok(())` on exit status zero. Cancelling `cancel` kills the
/// process and yields [`RunnerError::Cancelled`].
pub async fn stream_command(
    mut command: Command,
    output: &mpsc::Sender<String>,
    cancel: &CancellationToken,
) -> Result<(), RunnerError> {
    let program = command
        .as_std()
        .get_program()
        .to_string_lossy()
        .into_owned();

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|source| RunnerError::Spawn {
        program: program.clone(),
        source,
    })?;

    debug!("Spawned {} (pid {:?})", program, child.id());

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("stdout was not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("stderr was not captured"))?;

    let mut stdout_task = forward_lines(stdout, output.clone(), "");
    let mut stderr_task = forward_lines(stderr, output.clone(), STDERR_PREFIX);

    let status = tokio::select! {
        status = child.wait() => status?,
        _ = cancel.cancelled() => {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill {}: {}", program, e);
            }
            // Descendants may still hold the pipes open
            stdout_task.abort();
            stderr_task.abort();
            return Err(RunnerError::Cancelled);
        }
    };

    // Drain whatever was buffered before the exit. A background descendant
    // can keep the pipes open long after the process itself is gone.
    let drain = async {
        let _ = (&mut stdout_task).await;
        let _ = (&mut stderr_task).await;
    };
    let cancelled = tokio::select! {
        drained = tokio::time::timeout(DRAIN_TIMEOUT, drain) => {
            if drained.is_err() {
                warn!("{} exited but its output is still open; dropping the rest", program);
            }
            false
        }
        _ = cancel.cancelled() => true,
    };
    stdout_task.abort();
    stderr_task.abort();

    if cancelled {
        return Err(RunnerError::Cancelled);
    }

    debug!("{} exited with {}", program, status);

    if status.success() {
        Ok(())
    } else {
        match status.code() {
            Some(code) => Err(RunnerError::ExitStatus(code)),
            None => Err(RunnerError::Terminated),
        }
    }
}

fn forward_lines<R>(reader: R, output: mpsc::Sender<String>, prefix: &'static str) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']);
                    if output.send(format!("{}{}", prefix, line)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to read process output: {}", e);
                    break;
                }
            }
        }
    })
}
