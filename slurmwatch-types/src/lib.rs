//! # slurmwatch-types
//!
//! Core types for Slurm cluster monitoring. This crate defines the records
//! parsed from the scheduler's status commands, the summaries derived from
//! them, and the [`Snapshot`] that is published to dashboard consumers.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: the data model works without any
//!   serialization framework
//! - **Optional serialization**: enable the `serde` feature to export
//!   snapshots as JSON or any other serde format
//! - **Immutable snapshots**: facets are shared behind `Arc`, so replacing one
//!   facet never touches the others
//!
//! ## Example
//!
//! ```rust
//! use slurmwatch_types::{NodeRecord, NodeState, PartitionSummary};
//!
//! let node = NodeRecord::new("n1")
//!     .with_partitions(["p1", "p2"])
//!     .with_state(NodeState::Mixed)
//!     .with_cpus(8, 6);
//!
//! assert!(node.in_partition("p2"));
//! assert_eq!(node.cpus_idle, 2);
//!
//! let mut summary = PartitionSummary::new("p1");
//! summary.add_node(&node);
//! assert_eq!(summary.utilization(), 0.75);
//! ```

mod duration;
mod job;
mod node;
mod snapshot;
mod summary;

pub use duration::*;
pub use job::*;
pub use node::*;
pub use snapshot::*;
pub use summary::*;
