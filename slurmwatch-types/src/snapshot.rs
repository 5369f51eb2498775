//! Snapshot - a point-in-time view of the cluster.

use std::fmt;
use std::sync::Arc;

use crate::{JobGroupSummary, NodeRecord, NodeSummary, PartitionSummary, PendingWaitStats, StateCounts};

/// One independently refreshed part of the cluster view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Facet {
    Nodes,
    Jobs,
    Config,
}

impl Facet {
    /// All facets, in display order.
    pub const ALL: [Facet; 3] = [Facet::Nodes, Facet::Jobs, Facet::Config];

    pub fn label(&self) -> &'static str {
        match self {
            Facet::Nodes => "nodes",
            Facet::Jobs => "jobs",
            Facet::Config => "config",
        }
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Node records plus the views derived from them.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeFacet {
    /// Sorted by node name.
    pub nodes: Vec<NodeRecord>,
    /// Sorted by node count (descending), then name.
    pub partitions: Vec<PartitionSummary>,
    pub summary: NodeSummary,
    /// Malformed lines dropped while parsing.
    pub skipped_lines: usize,
}

impl NodeFacet {
    pub fn partition(&self, name: &str) -> Option<&PartitionSummary> {
        self.partitions.iter().find(|p| p.name == name)
    }
}

/// Job groupings and queue statistics.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JobFacet {
    pub total_jobs: usize,
    /// Cluster-wide counts by state.
    pub states: StateCounts,
    /// Sorted by total (descending), then account.
    pub by_account: Vec<JobGroupSummary>,
    /// Sorted by total (descending), then user.
    pub by_user: Vec<JobGroupSummary>,
    pub pending_wait: PendingWaitStats,
    /// Unix seconds that pending waits were measured against.
    pub computed_at: i64,
    /// Malformed lines dropped while parsing.
    pub skipped_lines: usize,
}

impl JobFacet {
    pub fn account(&self, key: &str) -> Option<&JobGroupSummary> {
        self.by_account.iter().find(|g| g.key == key)
    }

    pub fn user(&self, key: &str) -> Option<&JobGroupSummary> {
        self.by_user.iter().find(|g| g.key == key)
    }
}

/// Scheduler configuration dump, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ConfigText(String);

impl ConfigText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn line_count(&self) -> usize {
        self.0.lines().count()
    }
}

impl fmt::Display for ConfigText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Refresh bookkeeping for one facet.
///
/// A facet whose last attempt failed is stale: its data (if any) is from an
/// earlier successful refresh.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FacetStatus {
    /// Unix milliseconds of the last completed attempt, successful or not.
    pub last_attempt_ms: Option<u64>,
    /// Unix milliseconds of the last successful refresh.
    pub last_success_ms: Option<u64>,
    /// Error from the last attempt, cleared by the next success.
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

impl FacetStatus {
    pub fn record_success(&mut self, at_ms: u64) {
        self.last_attempt_ms = Some(at_ms);
        self.last_success_ms = Some(at_ms);
        self.last_error = None;
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self, at_ms: u64, error: impl Into<String>) {
        self.last_attempt_ms = Some(at_ms);
        self.last_error = Some(error.into());
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    pub fn is_stale(&self) -> bool {
        self.last_error.is_some()
    }

    pub fn attempted(&self) -> bool {
        self.last_attempt_ms.is_some()
    }

    /// Milliseconds since the last success, if there has been one.
    pub fn age_ms(&self, now_ms: u64) -> Option<u64> {
        self.last_success_ms.map(|t| now_ms.saturating_sub(t))
    }
}

/// Per-facet status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FacetStatuses {
    pub nodes: FacetStatus,
    pub jobs: FacetStatus,
    pub config: FacetStatus,
}

impl FacetStatuses {
    pub fn get(&self, facet: Facet) -> &FacetStatus {
        match facet {
            Facet::Nodes => &self.nodes,
            Facet::Jobs => &self.jobs,
            Facet::Config => &self.config,
        }
    }

    pub fn get_mut(&mut self, facet: Facet) -> &mut FacetStatus {
        match facet {
            Facet::Nodes => &mut self.nodes,
            Facet::Jobs => &mut self.jobs,
            Facet::Config => &mut self.config,
        }
    }
}

/// A point-in-time view of the cluster.
///
/// Facets are refreshed independently and shared behind `Arc`, so cloning a
/// snapshot is cheap and a published snapshot is never modified. A facet is
/// `None` until its first successful refresh.
///
/// # Example
///
/// ```rust
/// use slurmwatch_types::{Facet, Snapshot};
///
/// let snapshot = Snapshot::empty();
/// assert_eq!(snapshot.sequence, 0);
/// assert!(snapshot.nodes.is_none());
/// assert!(!snapshot.is_stale(Facet::Jobs));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Snapshot {
    /// Incremented on every publish; 0 for the initial empty snapshot.
    pub sequence: u64,
    /// Unix milliseconds of the publish that produced this snapshot.
    pub timestamp_ms: u64,
    pub nodes: Option<Arc<NodeFacet>>,
    pub jobs: Option<Arc<JobFacet>>,
    pub config: Option<Arc<ConfigText>>,
    pub status: FacetStatuses,
}

impl Snapshot {
    /// The snapshot before any refresh has completed.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn status(&self, facet: Facet) -> &FacetStatus {
        self.status.get(facet)
    }

    pub fn has_data(&self, facet: Facet) -> bool {
        match facet {
            Facet::Nodes => self.nodes.is_some(),
            Facet::Jobs => self.jobs.is_some(),
            Facet::Config => self.config.is_some(),
        }
    }

    pub fn is_stale(&self, facet: Facet) -> bool {
        self.status(facet).is_stale()
    }

    /// Facets whose last refresh failed.
    pub fn stale_facets(&self) -> Vec<Facet> {
        Facet::ALL
            .into_iter()
            .filter(|f| self.is_stale(*f))
            .collect()
    }

    /// Whether every facet has completed at least one refresh attempt.
    pub fn all_attempted(&self) -> bool {
        Facet::ALL.iter().all(|f| self.status(*f).attempted())
    }
}

/// Get current timestamp in milliseconds since Unix epoch.
pub fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
