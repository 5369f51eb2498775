//! Node records from the node/partition listing.

use std::collections::BTreeMap;
use std::fmt;

/// Scheduling state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum NodeState {
    Idle,
    Allocated,
    Mixed,
    Down,
    Drained,
    Unknown,
}

impl NodeState {
    /// Returns a short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            NodeState::Idle => "idle",
            NodeState::Allocated => "allocated",
            NodeState::Mixed => "mixed",
            NodeState::Down => "down",
            NodeState::Drained => "drained",
            NodeState::Unknown => "unknown",
        }
    }

    /// Whether jobs are running on the node (fully or partially allocated).
    pub fn is_busy(&self) -> bool {
        matches!(self, NodeState::Allocated | NodeState::Mixed)
    }

    /// Whether the node cannot take work: down, drained, or unknown.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            NodeState::Down | NodeState::Drained | NodeState::Unknown
        )
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One compute node as reported by the scheduler.
///
/// A node may belong to several partitions; it is still a single record, and
/// aggregation fans it out to each partition it lists.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeRecord {
    pub name: String,
    /// Partitions the node belongs to, in listing order, without duplicates.
    pub partitions: Vec<String>,
    pub state: NodeState,
    /// The node is held by an advance reservation or maintenance window.
    pub reserved: bool,
    pub cpus_total: u32,
    pub cpus_allocated: u32,
    pub cpus_idle: u32,
    pub memory_total_mb: u64,
    pub memory_allocated_mb: u64,
    /// Load average reported for the node, if the scheduler has one.
    pub cpu_load: Option<f64>,
    /// Availability (`up`, `down`, `drain`, `inact`) of each listed partition.
    #[cfg_attr(feature = "serde", serde(default))]
    pub availability: BTreeMap<String, String>,
}

impl NodeRecord {
    /// Create an idle node with no partitions and no resources.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partitions: Vec::new(),
            state: NodeState::Idle,
            reserved: false,
            cpus_total: 0,
            cpus_allocated: 0,
            cpus_idle: 0,
            memory_total_mb: 0,
            memory_allocated_mb: 0,
            cpu_load: None,
            availability: BTreeMap::new(),
        }
    }

    /// Set the partition list, dropping repeated names.
    pub fn with_partitions<I, S>(mut self, partitions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partitions.clear();
        for partition in partitions {
            self.add_partition(partition);
        }
        self
    }

    pub fn with_state(mut self, state: NodeState) -> Self {
        self.state = state;
        self
    }

    pub fn with_reserved(mut self, reserved: bool) -> Self {
        self.reserved = reserved;
        self
    }

    /// Set CPU counts; idle CPUs are whatever is not allocated.
    pub fn with_cpus(mut self, total: u32, allocated: u32) -> Self {
        self.cpus_total = total;
        self.cpus_allocated = allocated;
        self.cpus_idle = total.saturating_sub(allocated);
        self
    }

    pub fn with_memory(mut self, total_mb: u64, allocated_mb: u64) -> Self {
        self.memory_total_mb = total_mb;
        self.memory_allocated_mb = allocated_mb;
        self
    }

    pub fn with_cpu_load(mut self, load: Option<f64>) -> Self {
        self.cpu_load = load;
        self
    }

    /// Record the availability of one of the node's partitions.
    pub fn with_availability(
        mut self,
        partition: impl Into<String>,
        availability: impl Into<String>,
    ) -> Self {
        self.set_availability(partition, availability);
        self
    }

    /// Record the availability of a partition. The first value seen wins.
    pub fn set_availability(
        &mut self,
        partition: impl Into<String>,
        availability: impl Into<String>,
    ) {
        self.availability
            .entry(partition.into())
            .or_insert_with(|| availability.into());
    }

    pub fn partition_availability(&self, partition: &str) -> Option<&str> {
        self.availability.get(partition).map(String::as_str)
    }

    /// Add a partition unless the node already lists it.
    ///
    /// Returns `true` if the partition was added.
    pub fn add_partition(&mut self, partition: impl Into<String>) -> bool {
        let partition = partition.into();
        if self.in_partition(&partition) {
            return false;
        }
        self.partitions.push(partition);
        true
    }

    pub fn in_partition(&self, partition: &str) -> bool {
        self.partitions.iter().any(|p| p == partition)
    }

    pub fn memory_free_mb(&self) -> u64 {
        self.memory_total_mb.saturating_sub(self.memory_allocated_mb)
    }

    /// Some, but not all, CPUs are allocated.
    pub fn is_partially_allocated(&self) -> bool {
        self.cpus_allocated > 0 && self.cpus_allocated < self.cpus_total
    }
}
