//! Runs external status commands with a hard timeout.
//!
//! Children are spawned with `kill_on_drop`, so a dropped run never leaves a
//! process behind. On timeout or cancellation the child is killed and reaped
//! before returning.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::command::CommandSpec;
use crate::error::CommandError;

/// Captured output of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawOutput {
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl RawOutput {
    pub fn from_stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Default::default()
        }
    }
}

/// Run a command to completion, failing if it takes longer than `timeout`.
pub async fn run(spec: &CommandSpec, timeout: Duration) -> Result<RawOutput, CommandError> {
    run_cancellable(spec, timeout, &CancellationToken::new()).await
}

/// Like [`run`], but also abandons the run when `shutdown` is cancelled.
pub async fn run_cancellable(
    spec: &CommandSpec,
    timeout: Duration,
    shutdown: &CancellationToken,
) -> Result<RawOutput, CommandError> {
    let program = spec.program().to_string();
    if shutdown.is_cancelled() {
        return Err(CommandError::Cancelled { program });
    }

    let started = Instant::now();
    let mut child = Command::new(spec.program())
        .args(spec.get_args())
        .envs(spec.get_env().iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| spawn_error(&program, e))?;

    tracing::debug!(command = %spec, "spawned");

    let outcome = {
        let collect = collect_output(&mut child);
        tokio::select! {
            result = collect => Outcome::Exited(result),
            _ = tokio::time::sleep(timeout) => Outcome::TimedOut,
            _ = shutdown.cancelled() => Outcome::Cancelled,
        }
    };

    let (status, stdout, stderr) = match outcome {
        Outcome::Exited(Ok(output)) => output,
        Outcome::Exited(Err(e)) => {
            reap(&mut child, &program).await;
            return Err(CommandError::Spawn {
                program,
                message: e.to_string(),
            });
        }
        Outcome::TimedOut => {
            reap(&mut child, &program).await;
            return Err(CommandError::Timeout { program, timeout });
        }
        Outcome::Cancelled => {
            reap(&mut child, &program).await;
            return Err(CommandError::Cancelled { program });
        }
    };

    let elapsed = started.elapsed();
    let stdout = String::from_utf8_lossy(&stdout).into_owned();
    let stderr = String::from_utf8_lossy(&stderr).into_owned();

    if !status.success() {
        return Err(CommandError::Failed {
            program,
            code: status.code(),
            signal: exit_signal(&status),
            stderr: stderr.trim().to_string(),
        });
    }

    tracing::debug!(
        program = %program,
        elapsed_ms = elapsed.as_millis() as u64,
        bytes = stdout.len(),
        "command finished"
    );

    Ok(RawOutput {
        stdout,
        stderr,
        elapsed,
    })
}

enum Outcome {
    Exited(io::Result<(ExitStatus, Vec<u8>, Vec<u8>)>),
    TimedOut,
    Cancelled,
}

/// Wait for exit while draining both pipes, so a chatty child cannot block
/// on a full pipe buffer.
async fn collect_output(child: &mut Child) -> io::Result<(ExitStatus, Vec<u8>, Vec<u8>)> {
    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    let read_stdout = async {
        match stdout_pipe.as_mut() {
            Some(pipe) => pipe.read_to_end(&mut stdout).await.map(|_| ()),
            None => Ok(()),
        }
    };
    let read_stderr = async {
        match stderr_pipe.as_mut() {
            Some(pipe) => pipe.read_to_end(&mut stderr).await.map(|_| ()),
            None => Ok(()),
        }
    };

    let (status, (), ()) = tokio::try_join!(child.wait(), read_stdout, read_stderr)?;
    Ok((status, stdout, stderr))
}

async fn reap(child: &mut Child, program: &str) {
    if let Err(e) = child.kill().await {
        tracing::warn!(program, error = %e, "failed to kill child process");
    }
}

fn spawn_error(program: &str, err: io::Error) -> CommandError {
    if err.kind() == io::ErrorKind::NotFound {
        CommandError::NotFound {
            program: program.to_string(),
        }
    } else {
        CommandError::Spawn {
            program: program.to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}
