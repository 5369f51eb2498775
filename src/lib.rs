//! # slurmwatch
//!
//! Headless host for the Slurm dashboard refresh engine.
//!
//! The engine itself lives in [`slurmwatch_engine`]; this crate adds what a
//! long-running process needs around it:
//!
//! ```text
//!   settings file ─┐
//!   SLURMWATCH_*  ─┼─▶ config::Settings ─▶ EngineBuilder ─▶ Engine
//!   CLI flags     ─┘                                         │
//!                                                            ▼
//!                           report::summary_line ◀── subscribe() stream
//!                           report::write_export ◀── current()
//! ```
//!
//! - **[`config`]**: layered settings (defaults, TOML file, environment, flags)
//! - **[`report`]**: one-line summaries and JSON export of a snapshot
//! - **[`shutdown`]**: SIGINT/SIGTERM handling for a clean `stop()`
//!
//! ## Usage
//!
//! ```bash
//! # Log a summary line for every published snapshot
//! slurmwatch --delay 30 --timeout 20
//!
//! # Refresh every facet once and write the snapshot as JSON
//! slurmwatch --export snapshot.json
//! ```
//!
//! ### As a library
//!
//! ```no_run
//! use slurmwatch::{report, Settings};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let settings = Settings::load(None)?.with_overrides(Some(10), None);
//! let engine = settings.engine_builder()?.build();
//! engine.start();
//!
//! tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//! println!("{}", report::summary_line(&engine.current()));
//!
//! engine.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod report;
pub mod shutdown;

pub use config::{FacetSettings, Settings};

// Re-export the engine surface for convenience
pub use slurmwatch_engine::{Engine, EngineBuilder, Facet, Snapshot};
