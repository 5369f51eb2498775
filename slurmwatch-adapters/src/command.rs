//! Status command definitions.
//!
//! Commands are spawned directly (no shell). The default argument lists pin
//! the output format that the parsers in [`crate::parse`] expect: one record
//! per line, fields separated by `|`, times as Unix epoch seconds.

use std::fmt;

/// Field separator used by the default output formats.
pub const FIELD_SEPARATOR: char = '|';

/// Environment forcing epoch-second timestamps in scheduler output.
pub const TIME_FORMAT_ENV: (&str, &str) = ("SLURM_TIME_FORMAT", "%s");

/// A program plus arguments and extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Build from an argv list: the first element is the program.
    ///
    /// Returns `None` for an empty list or an empty program name.
    pub fn from_argv<I, S>(argv: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut iter = argv.into_iter().map(Into::into);
        let program = iter.next().filter(|p| !p.trim().is_empty())?;
        Some(Self::new(program).args(iter))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_env(&self) -> &[(String, String)] {
        &self.env
    }

    /// Node and partition listing.
    pub fn nodes() -> Self {
        Self::new("sinfo")
            .args([
                "--Node",
                "--noheader",
                "--Format=NodeList:64|,PartitionName:64|,StateLong:32|,CPUsState:32|,Memory:16|,AllocMem:16|,CPUsLoad:16|,Available:16",
            ])
            .env(TIME_FORMAT_ENV.0, TIME_FORMAT_ENV.1)
    }

    /// Job queue listing, including jobs from hidden partitions.
    pub fn jobs() -> Self {
        Self::new("squeue")
            .args([
                "--all",
                "--noheader",
                "--Format=JobID:64|,Account:64|,UserName:64|,State:24|,SubmitTime:24|,EligibleTime:24",
            ])
            .env(TIME_FORMAT_ENV.0, TIME_FORMAT_ENV.1)
    }

    /// Scheduler configuration dump.
    pub fn config() -> Self {
        Self::new("scontrol").args(["show", "config"])
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}
