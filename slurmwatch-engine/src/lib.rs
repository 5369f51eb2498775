//! # slurmwatch-engine
//!
//! Data-refresh and aggregation engine for Slurm cluster dashboards.
//!
//! The engine periodically runs the Slurm status commands, parses their
//! output, aggregates it into per-partition, per-account and per-user
//! summaries, and publishes immutable [`Snapshot`]s that a display layer can
//! read or subscribe to.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futures_util::StreamExt;
//! use slurmwatch_engine::Engine;
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = Engine::new();
//!     let mut updates = engine.subscribe();
//!
//!     engine.start();
//!
//!     while let Some(snapshot) = updates.next().await {
//!         if let Some(jobs) = &snapshot.jobs {
//!             println!("{} jobs queued or running", jobs.total_jobs);
//!         }
//!     }
//! }
//! ```
//!
//! ## Features
//!
//! - **Independent facets**: nodes, jobs and config refresh on their own
//!   timers and fail independently
//! - **No overlap**: at most one external command per facet at a time
//! - **Stale, not blank**: a failed refresh keeps the last good data and
//!   records the error next to it
//! - **Clean shutdown**: `stop()` kills and reaps in-flight commands

pub mod aggregate;
mod engine;
mod pipeline;
mod store;
mod subscription;

pub use engine::{Engine, EngineBuilder, DEFAULT_INTERVAL, DEFAULT_TIMEOUT};
pub use pipeline::{CycleOutcome, Phase};
pub use store::{FacetUpdate, SnapshotStore};
pub use subscription::SnapshotStream;

// Re-export types for convenience
pub use slurmwatch_adapters::{AdapterError, CommandError, CommandSpec, Fetch, ParseError, RawOutput};
pub use slurmwatch_types::{Facet, FacetStatus, JobFacet, NodeFacet, Snapshot};
