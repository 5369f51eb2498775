//! # slurmwatch-adapters
//!
//! Everything that touches the Slurm command-line tools: the fixed command
//! set, a runner that executes them under a hard timeout, and parsers that
//! turn their delimited output into typed records.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use slurmwatch_adapters::{parse, runner, CommandSpec};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let output = runner::run(&CommandSpec::nodes(), Duration::from_secs(20)).await?;
//!     let parsed = parse::parse_nodes(&output.stdout)?;
//!
//!     println!("{} nodes, {} lines skipped", parsed.records.len(), parsed.skipped);
//!     Ok(())
//! }
//! ```

pub mod command;
pub mod error;
pub mod fetch;
pub mod parse;
pub mod runner;

pub use command::CommandSpec;
pub use error::{AdapterError, CommandError, ParseError};
pub use fetch::{CommandFetcher, Fetch};
pub use parse::Parsed;
pub use runner::RawOutput;

// Re-export types for convenience
pub use slurmwatch_types::{ConfigText, JobRecord, JobState, NodeRecord, NodeState};
