//! Error types for adapters.

use std::time::Duration;

use thiserror::Error;

/// Errors from running an external status command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The program is not installed or not on `PATH`.
    #[error("{program}: command not found")]
    NotFound { program: String },

    /// The program exists but could not be started.
    #[error("{program}: failed to start: {message}")]
    Spawn { program: String, message: String },

    /// The process did not finish within the timeout and was killed.
    #[error("{program}: timed out after {}s", .timeout.as_secs_f64())]
    Timeout { program: String, timeout: Duration },

    /// The process exited unsuccessfully.
    #[error("{program}: {}: {stderr}", describe_exit(.code, .signal))]
    Failed {
        program: String,
        code: Option<i32>,
        signal: Option<i32>,
        stderr: String,
    },

    /// The run was abandoned because the engine is stopping.
    #[error("{program}: cancelled")]
    Cancelled { program: String },
}

impl CommandError {
    pub fn program(&self) -> &str {
        match self {
            CommandError::NotFound { program }
            | CommandError::Spawn { program, .. }
            | CommandError::Timeout { program, .. }
            | CommandError::Failed { program, .. }
            | CommandError::Cancelled { program } => program,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CommandError::Cancelled { .. })
    }
}

fn describe_exit(code: &Option<i32>, signal: &Option<i32>) -> String {
    match (*code, *signal) {
        (Some(code), _) => format!("exited with status {}", code),
        (None, Some(signal)) => format!("killed by signal {}", signal),
        (None, None) => "exited abnormally".to_string(),
    }
}

/// Errors from parsing command output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The command printed nothing usable.
    #[error("empty output")]
    Empty,

    /// Every non-blank line was malformed.
    #[error("no recognizable records in {lines} line(s)")]
    Unrecognized { lines: usize },
}

/// Errors that can occur while refreshing one facet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("failed to parse output: {0}")]
    Parse(#[from] ParseError),
}

impl AdapterError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AdapterError::Command(e) if e.is_cancelled())
    }
}
