//! One refresh cycle for one facet: fetch, parse, aggregate, publish.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use slurmwatch_adapters::{parse, AdapterError, Fetch};
use slurmwatch_types::Facet;

use crate::aggregate;
use crate::store::{FacetUpdate, SnapshotStore};

/// Where a facet's refresh cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Fetching,
    Parsing,
    Aggregating,
    Publishing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Fetching => "fetching",
            Phase::Parsing => "parsing",
            Phase::Aggregating => "aggregating",
            Phase::Publishing => "publishing",
        };
        f.write_str(s)
    }
}

/// How a refresh cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// New data was published. `skipped` counts malformed lines.
    Published { skipped: usize },
    /// The error was recorded against the facet.
    Failed(AdapterError),
    /// The engine stopped mid-cycle; nothing was recorded.
    Cancelled,
}

impl CycleOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, CycleOutcome::Published { .. })
    }
}

/// A facet's fetcher plus its scheduling state.
#[derive(Debug)]
pub(crate) struct Source {
    pub(crate) facet: Facet,
    pub(crate) interval: Duration,
    fetcher: Arc<dyn Fetch>,
    phase: Mutex<Phase>,
    /// Held for the whole cycle so scheduled and manual refreshes never overlap.
    cycle: tokio::sync::Mutex<()>,
}

impl Source {
    pub(crate) fn new(facet: Facet, interval: Duration, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            facet,
            interval,
            fetcher,
            phase: Mutex::new(Phase::Idle),
            cycle: tokio::sync::Mutex::new(()),
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        *self.phase.lock()
    }

    fn enter(&self, phase: Phase) {
        tracing::debug!(facet = %self.facet, %phase, "phase");
        *self.phase.lock() = phase;
    }

    /// Run one cycle, waiting for any cycle already in progress to finish.
    pub(crate) async fn run_cycle(
        &self,
        store: &SnapshotStore,
        shutdown: &CancellationToken,
    ) -> CycleOutcome {
        let _cycle = tokio::select! {
            guard = self.cycle.lock() => guard,
            _ = shutdown.cancelled() => return CycleOutcome::Cancelled,
        };

        let outcome = self.cycle_inner(store, shutdown).await;
        self.enter(Phase::Idle);

        match &outcome {
            CycleOutcome::Published { skipped } if *skipped > 0 => {
                tracing::warn!(facet = %self.facet, skipped, "skipped malformed lines");
            }
            CycleOutcome::Failed(error) => {
                tracing::warn!(facet = %self.facet, error = %error, "refresh failed");
                store.publish(FacetUpdate::Failed {
                    facet: self.facet,
                    error: error.to_string(),
                });
            }
            _ => {}
        }
        outcome
    }

    async fn cycle_inner(&self, store: &SnapshotStore, shutdown: &CancellationToken) -> CycleOutcome {
        self.enter(Phase::Fetching);
        let raw = match self.fetcher.fetch(shutdown).await {
            Ok(raw) => raw,
            Err(e) if e.is_cancelled() => return CycleOutcome::Cancelled,
            Err(e) => return CycleOutcome::Failed(e.into()),
        };
        tracing::debug!(
            facet = %self.facet,
            source = self.fetcher.description(),
            elapsed_ms = raw.elapsed.as_millis() as u64,
            "fetched"
        );

        self.enter(Phase::Parsing);
        let (update, skipped) = match self.parse_and_aggregate(&raw.stdout) {
            Ok(result) => result,
            Err(e) => return CycleOutcome::Failed(e),
        };

        self.enter(Phase::Publishing);
        store.publish(update);
        CycleOutcome::Published { skipped }
    }

    fn parse_and_aggregate(&self, text: &str) -> Result<(FacetUpdate, usize), AdapterError> {
        match self.facet {
            Facet::Nodes => {
                let parsed = parse::parse_nodes(text)?;
                let skipped = parsed.skipped;
                self.enter(Phase::Aggregating);
                Ok((FacetUpdate::Nodes(aggregate::aggregate_nodes(parsed)), skipped))
            }
            Facet::Jobs => {
                let parsed = parse::parse_jobs(text)?;
                let skipped = parsed.skipped;
                self.enter(Phase::Aggregating);
                let now = unix_now();
                Ok((FacetUpdate::Jobs(aggregate::aggregate_jobs(parsed, now)), skipped))
            }
            Facet::Config => {
                let text = parse::parse_config(text)?;
                Ok((FacetUpdate::Config(text), 0))
            }
        }
    }
}

fn unix_now() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
