//! Plain-text and JSON renderings of a snapshot for the headless host.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use slurmwatch_engine::Snapshot;

/// One-line summary of a snapshot, suitable for a log line.
pub fn summary_line(snapshot: &Snapshot) -> String {
    let mut line = format!("#{}", snapshot.sequence);

    match &snapshot.nodes {
        Some(nodes) => {
            let s = &nodes.summary;
            let _ = write!(
                line,
                " nodes={} broken={} cpus={}/{} ({:.0}%)",
                s.nodes_total,
                s.nodes_broken,
                s.cpus_allocated,
                s.cpus_total,
                s.cpu_utilization() * 100.0
            );
        }
        None => line.push_str(" nodes=-"),
    }

    match &snapshot.jobs {
        Some(jobs) => {
            let _ = write!(
                line,
                " jobs={} running={} pending={}",
                jobs.total_jobs, jobs.states.running, jobs.states.pending
            );
            match (jobs.pending_wait.max(), jobs.pending_wait.median()) {
                (Some(max), Some(median)) => {
                    let _ = write!(line, " wait_max={} wait_median={}", max, median);
                }
                _ => line.push_str(" wait=none"),
            }
        }
        None => line.push_str(" jobs=-"),
    }

    let stale = snapshot.stale_facets();
    if !stale.is_empty() {
        let names: Vec<&str> = stale.iter().map(|f| f.label()).collect();
        let _ = write!(line, " stale={}", names.join(","));
    }
    line
}

/// Write a snapshot as pretty-printed JSON.
pub fn write_export(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot).context("failed to serialize snapshot")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write export to {}", path.display()))?;
    Ok(())
}
