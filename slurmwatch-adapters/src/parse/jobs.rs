//! Job listing parser.
//!
//! Expected line layout (see [`CommandSpec::jobs`](crate::CommandSpec::jobs)):
//!
//! ```text
//! job_id|account|user|state|submit_time|eligible_time
//! ```
//!
//! An empty listing is an empty queue, not an error: the queue command prints
//! nothing at all when no jobs exist.

use chrono::{Local, NaiveDateTime, TimeZone};

use slurmwatch_types::{JobRecord, JobState};

use super::{fields, LineTally, Parsed};
use crate::error::ParseError;

/// Account shown for jobs submitted without one.
pub const NO_ACCOUNT: &str = "(none)";

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parse the job listing.
pub fn parse_jobs(text: &str) -> Result<Parsed<JobRecord>, ParseError> {
    let mut tally = LineTally::default();
    let mut records = Vec::new();

    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        match parse_line(line) {
            Some(record) => {
                tally.accept();
                records.push(record);
            }
            None => tally.skip(line),
        }
    }

    tally.finish(records, true)
}

fn parse_line(line: &str) -> Option<JobRecord> {
    let f = fields(line);
    if f.len() < 5 {
        return None;
    }

    let (job_id, account, user, raw_state) = (f[0], f[1], f[2], f[3]);
    if job_id.is_empty() || user.is_empty() || raw_state.is_empty() {
        return None;
    }
    let account = if account.is_empty() { NO_ACCOUNT } else { account };
    let state = JobState::from(raw_state);

    // submit time must be present and well-formed
    let submitted_at = parse_timestamp(f[4])??;
    let queued_at = match f.get(5) {
        Some(raw) => parse_timestamp(raw)?,
        None => None,
    };

    let mut record = JobRecord::new(job_id, account, user, state, submitted_at);
    if record.state.is_pending() {
        record = record.with_queued_at(queued_at?);
    }
    Some(record)
}

/// Parse a scheduler timestamp.
///
/// Accepts Unix epoch seconds or `YYYY-MM-DDTHH:MM:SS` in local time.
/// Returns `Some(None)` for the placeholders the scheduler prints for
/// unset times, and `None` when the text is not a timestamp at all.
pub fn parse_timestamp(raw: &str) -> Option<Option<i64>> {
    let raw = raw.trim();
    match raw {
        "" | "0" | "N/A" | "None" | "Unknown" | "(null)" => return Some(None),
        _ => {}
    }

    if raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw.parse::<i64>().ok().map(Some);
    }

    let naive = NaiveDateTime::parse_from_str(raw, ISO_FORMAT).ok()?;
    let local = Local.from_local_datetime(&naive).earliest()?;
    Some(Some(local.timestamp()))
}
