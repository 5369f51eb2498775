//! Snapshot store - the single shared view of the cluster.
//!
//! The current snapshot lives in a `watch` channel. Each publish copies the
//! current snapshot, replaces one facet (or records an error against it) and
//! swaps the result in, so readers only ever see whole snapshots.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use slurmwatch_types::{current_timestamp_ms, ConfigText, Facet, JobFacet, NodeFacet, Snapshot};

use crate::subscription::SnapshotStream;

/// The result of one refresh cycle, applied to a single facet.
#[derive(Debug, Clone, PartialEq)]
pub enum FacetUpdate {
    Nodes(NodeFacet),
    Jobs(JobFacet),
    Config(ConfigText),
    /// The refresh failed; the facet keeps its last good data.
    Failed { facet: Facet, error: String },
}

impl FacetUpdate {
    pub fn facet(&self) -> Facet {
        match self {
            FacetUpdate::Nodes(_) => Facet::Nodes,
            FacetUpdate::Jobs(_) => Facet::Jobs,
            FacetUpdate::Config(_) => Facet::Config,
            FacetUpdate::Failed { facet, .. } => *facet,
        }
    }
}

/// Holds the current and previous snapshots.
#[derive(Debug)]
pub struct SnapshotStore {
    current: watch::Sender<Arc<Snapshot>>,
    /// Also serializes publishers.
    previous: Mutex<Option<Arc<Snapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (current, _) = watch::channel(Arc::new(Snapshot::empty()));
        Self {
            current,
            previous: Mutex::new(None),
        }
    }

    /// The latest published snapshot.
    pub fn current(&self) -> Arc<Snapshot> {
        self.current.borrow().clone()
    }

    /// The snapshot replaced by the latest publish, if any.
    pub fn previous(&self) -> Option<Arc<Snapshot>> {
        self.previous.lock().clone()
    }

    /// Apply an update at the current wall-clock time.
    pub fn publish(&self, update: FacetUpdate) -> Arc<Snapshot> {
        self.publish_at(update, current_timestamp_ms())
    }

    /// Apply an update, stamping the new snapshot with `now_ms`.
    pub fn publish_at(&self, update: FacetUpdate, now_ms: u64) -> Arc<Snapshot> {
        let mut previous = self.previous.lock();
        let old = self.current.borrow().clone();

        let mut next = Snapshot::clone(&old);
        next.sequence = old.sequence + 1;
        next.timestamp_ms = now_ms;
        let status = next.status.get_mut(update.facet());
        match update {
            FacetUpdate::Nodes(facet) => {
                status.record_success(now_ms);
                next.nodes = Some(Arc::new(facet));
            }
            FacetUpdate::Jobs(facet) => {
                status.record_success(now_ms);
                next.jobs = Some(Arc::new(facet));
            }
            FacetUpdate::Config(text) => {
                status.record_success(now_ms);
                next.config = Some(Arc::new(text));
            }
            FacetUpdate::Failed { error, .. } => status.record_failure(now_ms, error),
        }

        let next = Arc::new(next);
        self.current.send_replace(next.clone());
        *previous = Some(old);
        next
    }

    /// Stream of snapshots published after this call.
    ///
    /// Publishes made between two polls collapse into the newest one. Failure
    /// publishes are delivered like any other.
    pub fn subscribe(&self) -> SnapshotStream {
        SnapshotStream::new(self.current.subscribe())
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
