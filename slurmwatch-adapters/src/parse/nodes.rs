//! Node/partition listing parser.
//!
//! Expected line layout (see [`CommandSpec::nodes`](crate::CommandSpec::nodes)):
//!
//! ```text
//! name|partitions|state|alloc/idle/other/total|memory_mb|alloc_memory_mb|cpu_load|availability
//! ```
//!
//! The last three columns are optional.
//!
//! The listing has one line per (node, partition) pair; lines for the same
//! node are merged into a single record.

use std::collections::HashMap;

use slurmwatch_types::{NodeRecord, NodeState};

use super::{fields, LineTally, Parsed};
use crate::error::ParseError;

/// Status suffixes the scheduler appends to state names (`down*`, `idle~`).
const STATUS_SYMBOLS: &[char] = &['*', '~', '#', '!', '%', '$', '@', '^', '-'];

/// Parse the node listing.
pub fn parse_nodes(text: &str) -> Result<Parsed<NodeRecord>, ParseError> {
    let mut tally = LineTally::default();
    let mut records: Vec<NodeRecord> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let Some(record) = parse_line(line) else {
            tally.skip(line);
            continue;
        };
        tally.accept();

        match index.get(&record.name) {
            Some(&i) => {
                let existing = &mut records[i];
                for (partition, availability) in record.availability {
                    existing.set_availability(partition, availability);
                }
                for partition in record.partitions {
                    existing.add_partition(partition);
                }
            }
            None => {
                index.insert(record.name.clone(), records.len());
                records.push(record);
            }
        }
    }

    tally.finish(records, false)
}

fn parse_line(line: &str) -> Option<NodeRecord> {
    let f = fields(line);
    if f.len() < 5 {
        return None;
    }

    let name = f[0];
    if name.is_empty() {
        return None;
    }

    if f[2].is_empty() {
        return None;
    }
    let (state, reserved) = parse_node_state(f[2]);
    let (allocated, idle, total) = parse_cpu_state(f[3])?;
    let memory_total_mb = f[4].parse::<u64>().ok()?;
    let memory_allocated_mb = match f.get(5).copied() {
        None | Some("") | Some("N/A") => 0,
        Some(raw) => raw.parse::<u64>().ok()?,
    };
    let cpu_load = match f.get(6).copied() {
        None | Some("") | Some("N/A") => None,
        Some(raw) => Some(raw.parse::<f64>().ok().filter(|l| l.is_finite())?),
    };
    let availability = f
        .get(7)
        .copied()
        .filter(|a| !a.is_empty() && *a != "N/A")
        .map(str::to_ascii_lowercase);

    let mut record = NodeRecord::new(name)
        .with_state(state)
        .with_reserved(reserved)
        .with_memory(memory_total_mb, memory_allocated_mb)
        .with_cpu_load(cpu_load);
    record.cpus_total = total;
    record.cpus_allocated = allocated;
    record.cpus_idle = idle;

    for partition in f[1].split(',') {
        let partition = partition.trim().trim_end_matches('*');
        if !partition.is_empty() {
            record.add_partition(partition);
            if let Some(availability) = &availability {
                record.set_availability(partition, availability.as_str());
            }
        }
    }

    Some(record)
}

/// `allocated/idle/other/total` → (allocated, idle, total)
fn parse_cpu_state(raw: &str) -> Option<(u32, u32, u32)> {
    let mut parts = raw.split('/').map(|p| p.trim().parse::<u32>());
    let allocated = parts.next()?.ok()?;
    let idle = parts.next()?.ok()?;
    let _other = parts.next()?.ok()?;
    let total = parts.next()?.ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((allocated, idle, total))
}

/// Map a long-form node state such as `mixed`, `down*` or `idle+drain` to a
/// [`NodeState`] and a reservation flag.
///
/// The first `+`-separated token is the base state; later tokens are flags.
/// A drain flag overrides the base state, reservation and maintenance flags
/// mark the node as reserved.
pub fn parse_node_state(raw: &str) -> (NodeState, bool) {
    let lower = raw.trim().to_ascii_lowercase();
    let mut tokens = lower
        .split('+')
        .map(|t| t.trim().trim_end_matches(STATUS_SYMBOLS));

    let base = tokens.next().unwrap_or_default();
    let (mut state, mut reserved) = match base {
        "idle" => (NodeState::Idle, false),
        "allocated" | "alloc" | "completing" => (NodeState::Allocated, false),
        "mixed" | "mix" => (NodeState::Mixed, false),
        "down" | "fail" | "failing" | "no_respond" | "not_responding" => (NodeState::Down, false),
        "drained" | "draining" | "drain" => (NodeState::Drained, false),
        "reserved" | "resv" => (NodeState::Idle, true),
        _ => (NodeState::Unknown, false),
    };

    for flag in tokens {
        if flag.starts_with("drain") {
            state = NodeState::Drained;
        } else if matches!(flag, "resv" | "reserved" | "maint") {
            reserved = true;
        }
    }

    (state, reserved)
}
