//! Aggregated views over node and job records.

use std::collections::BTreeSet;
use std::fmt;

use crate::{JobState, NodeRecord, NodeState, Seconds};

/// Capacity and usage of one partition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PartitionSummary {
    pub name: String,
    pub nodes_total: u32,
    pub nodes_idle: u32,
    /// Nodes that are fully or partially allocated.
    pub nodes_allocated: u32,
    pub cpus_total: u64,
    pub cpus_idle: u64,
    pub cpus_allocated: u64,
    /// Distinct availability values reported for the partition.
    pub availability: BTreeSet<String>,
    /// Distinct states of the member nodes.
    pub states: BTreeSet<NodeState>,
}

impl PartitionSummary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Count a node towards this partition.
    pub fn add_node(&mut self, node: &NodeRecord) {
        self.nodes_total += 1;
        if node.state == NodeState::Idle {
            self.nodes_idle += 1;
        } else if node.state.is_busy() {
            self.nodes_allocated += 1;
        }
        self.cpus_total += u64::from(node.cpus_total);
        self.cpus_idle += u64::from(node.cpus_idle);
        self.cpus_allocated += u64::from(node.cpus_allocated);
        if let Some(availability) = node.partition_availability(&self.name) {
            self.availability.insert(availability.to_string());
        }
        self.states.insert(node.state);
    }

    /// Distinct availability values joined for display, e.g. `"down, up"`.
    pub fn availability_label(&self) -> String {
        self.availability
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Fraction of CPUs allocated, in `[0, 1]`. Zero when the partition has
    /// no CPUs.
    pub fn utilization(&self) -> f64 {
        if self.cpus_total == 0 {
            return 0.0;
        }
        (self.cpus_allocated as f64 / self.cpus_total as f64).min(1.0)
    }
}

/// Cluster-wide node metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeSummary {
    pub nodes_total: u32,
    pub cpus_total: u64,
    pub cpus_allocated: u64,
    pub memory_total_mb: u64,
    pub memory_allocated_mb: u64,
    /// Down, drained, or in an unknown state.
    pub nodes_broken: u32,
    pub nodes_reserved: u32,
    /// Nodes with some but not all CPUs allocated.
    pub nodes_mixed: u32,
}

impl NodeSummary {
    pub fn add_node(&mut self, node: &NodeRecord) {
        self.nodes_total += 1;
        self.cpus_total += u64::from(node.cpus_total);
        self.cpus_allocated += u64::from(node.cpus_allocated);
        self.memory_total_mb += node.memory_total_mb;
        self.memory_allocated_mb += node.memory_allocated_mb;
        if node.state.is_unavailable() {
            self.nodes_broken += 1;
        }
        if node.reserved {
            self.nodes_reserved += 1;
        }
        if node.is_partially_allocated() {
            self.nodes_mixed += 1;
        }
    }

    pub fn cpu_utilization(&self) -> f64 {
        if self.cpus_total == 0 {
            return 0.0;
        }
        (self.cpus_allocated as f64 / self.cpus_total as f64).min(1.0)
    }

    pub fn memory_utilization(&self) -> f64 {
        if self.memory_total_mb == 0 {
            return 0.0;
        }
        (self.memory_allocated_mb as f64 / self.memory_total_mb as f64).min(1.0)
    }
}

/// Job counts broken down by state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StateCounts {
    pub pending: u64,
    pub running: u64,
    pub completed: u64,
    pub other: u64,
}

impl StateCounts {
    pub fn record(&mut self, state: &JobState) {
        match state {
            JobState::Pending => self.pending += 1,
            JobState::Running => self.running += 1,
            JobState::Completed => self.completed += 1,
            JobState::Other(_) => self.other += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.pending + self.running + self.completed + self.other
    }
}

/// The job attribute that groups are keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum JobGrouping {
    Account,
    User,
}

impl fmt::Display for JobGrouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobGrouping::Account => f.write_str("account"),
            JobGrouping::User => f.write_str("user"),
        }
    }
}

/// Job counts for one account or one user.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JobGroupSummary {
    pub key: String,
    pub counts: StateCounts,
}

impl JobGroupSummary {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            counts: StateCounts::default(),
        }
    }

    pub fn total(&self) -> u64 {
        self.counts.total()
    }
}

/// Queue wait statistics over pending jobs.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum PendingWaitStats {
    /// No pending job had a known queue time.
    #[default]
    NoPendingJobs,
    Observed {
        jobs: usize,
        max: Seconds,
        median: Seconds,
        mean: Seconds,
    },
}

impl PendingWaitStats {
    pub fn is_empty(&self) -> bool {
        matches!(self, PendingWaitStats::NoPendingJobs)
    }

    pub fn jobs(&self) -> usize {
        match self {
            PendingWaitStats::NoPendingJobs => 0,
            PendingWaitStats::Observed { jobs, .. } => *jobs,
        }
    }

    pub fn max(&self) -> Option<Seconds> {
        match self {
            PendingWaitStats::NoPendingJobs => None,
            PendingWaitStats::Observed { max, .. } => Some(*max),
        }
    }

    pub fn median(&self) -> Option<Seconds> {
        match self {
            PendingWaitStats::NoPendingJobs => None,
            PendingWaitStats::Observed { median, .. } => Some(*median),
        }
    }

    pub fn mean(&self) -> Option<Seconds> {
        match self {
            PendingWaitStats::NoPendingJobs => None,
            PendingWaitStats::Observed { mean, .. } => Some(*mean),
        }
    }
}
