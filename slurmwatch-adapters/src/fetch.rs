//! Fetcher abstraction over where raw status text comes from.
//!
//! The engine only sees [`Fetch`]; production uses [`CommandFetcher`], tests
//! substitute scripted fetchers.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::command::CommandSpec;
use crate::error::CommandError;
use crate::runner::{self, RawOutput};

/// Trait for obtaining the raw text of one status listing.
#[async_trait]
pub trait Fetch: Send + Sync + Debug {
    /// Produce the raw output.
    ///
    /// Implementations should return promptly with
    /// [`CommandError::Cancelled`] once `shutdown` is cancelled.
    async fn fetch(&self, shutdown: &CancellationToken) -> Result<RawOutput, CommandError>;

    /// Returns a human-readable description of the source, used in logs.
    fn description(&self) -> &str;
}

/// Fetches by running an external command with a timeout.
#[derive(Debug, Clone)]
pub struct CommandFetcher {
    spec: CommandSpec,
    timeout: Duration,
    description: String,
}

impl CommandFetcher {
    pub fn new(spec: CommandSpec, timeout: Duration) -> Self {
        let description = spec.program().to_string();
        Self {
            spec,
            timeout,
            description,
        }
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Fetch for CommandFetcher {
    async fn fetch(&self, shutdown: &CancellationToken) -> Result<RawOutput, CommandError> {
        runner::run_cancellable(&self.spec, self.timeout, shutdown).await
    }

    fn description(&self) -> &str {
        &self.description
    }
}
