//! Job records from the queue listing.

use std::fmt;

use crate::Seconds;

/// Lifecycle state of a job.
///
/// Only the states the dashboard counts separately get their own variant;
/// everything else keeps its raw scheduler label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Other(String),
}

impl JobState {
    pub fn label(&self) -> &str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Other(raw) => raw,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, JobState::Pending)
    }
}

/// Maps scheduler state names, long or short form.
impl From<&str> for JobState {
    fn from(s: &str) -> Self {
        match s.trim() {
            "PENDING" | "PD" => JobState::Pending,
            "RUNNING" | "R" => JobState::Running,
            "COMPLETED" | "CD" => JobState::Completed,
            other => JobState::Other(other.to_string()),
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One job from the queue listing.
///
/// Timestamps are Unix epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JobRecord {
    pub job_id: String,
    pub account: String,
    pub user: String,
    pub state: JobState,
    pub submitted_at: i64,
    /// When the job became eligible to start. Absent for jobs that are
    /// not (or no longer) waiting in the queue.
    pub queued_at: Option<i64>,
}

impl JobRecord {
    pub fn new(
        job_id: impl Into<String>,
        account: impl Into<String>,
        user: impl Into<String>,
        state: JobState,
        submitted_at: i64,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            account: account.into(),
            user: user.into(),
            state,
            submitted_at,
            queued_at: None,
        }
    }

    pub fn with_queued_at(mut self, queued_at: i64) -> Self {
        self.queued_at = Some(queued_at);
        self
    }

    /// How long a pending job has been waiting at `now`.
    ///
    /// `None` unless the job is pending with a known queue time. A queue time
    /// in the future (clock skew) counts as no wait.
    pub fn pending_wait(&self, now: i64) -> Option<Seconds> {
        if !self.state.is_pending() {
            return None;
        }
        let queued_at = self.queued_at?;
        let elapsed = now.saturating_sub(queued_at).max(0);
        Some(Seconds(elapsed as f64))
    }
}
