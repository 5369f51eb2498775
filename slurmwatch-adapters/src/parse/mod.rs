//! Parsers for status command output.
//!
//! Parsing is tolerant: a malformed line is dropped and counted in
//! [`Parsed::skipped`]. Only input that is empty, or in which no line at all
//! could be understood, fails with a [`ParseError`].

mod config;
mod jobs;
mod nodes;

pub use config::parse_config;
pub use jobs::{parse_jobs, parse_timestamp};
pub use nodes::{parse_node_state, parse_nodes};

use crate::command::FIELD_SEPARATOR;
use crate::error::ParseError;

/// Records parsed from one command output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    /// Non-blank lines that could not be parsed.
    pub skipped: usize,
}

impl<T> Parsed<T> {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Split a delimited line into trimmed fields.
fn fields(line: &str) -> Vec<&str> {
    line.split(FIELD_SEPARATOR).map(str::trim).collect()
}

/// Tracks line outcomes and applies the whole-input failure rules.
#[derive(Debug, Default)]
struct LineTally {
    parsed: usize,
    skipped: usize,
}

impl LineTally {
    fn accept(&mut self) {
        self.parsed += 1;
    }

    fn skip(&mut self, line: &str) {
        tracing::trace!(line, "skipping malformed line");
        self.skipped += 1;
    }

    fn lines(&self) -> usize {
        self.parsed + self.skipped
    }

    fn finish<T>(self, records: Vec<T>, allow_empty: bool) -> Result<Parsed<T>, ParseError> {
        if self.lines() == 0 {
            if allow_empty {
                return Ok(Parsed {
                    records,
                    skipped: 0,
                });
            }
            return Err(ParseError::Empty);
        }
        if self.parsed == 0 {
            return Err(ParseError::Unrecognized {
                lines: self.skipped,
            });
        }
        Ok(Parsed {
            records,
            skipped: self.skipped,
        })
    }
}
