// crates/types/src/job.rs
//! Job lifecycle types. A job is an opaque server-side operation that
//! becomes terminal exactly once.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend-assigned identifier for a server-side job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a job is in its lifecycle, as reported by the backend.
/// `Done` covers both success and failure; a terminal snapshot with an
/// error message is a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobPhase {
    Pending,
    Running,
    Done,
}

/// A point-in-time view of a job, returned by polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub phase: JobPhase,
    /// Set when the job reached `Done` with an error.
    pub error: Option<String>,
    pub statistics: Option<JobStatistics>,
}

impl JobSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.phase == JobPhase::Done
    }
}

/// Throughput counters the backend reports for finished jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatistics {
    pub rows_processed: Option<u64>,
    pub bytes_processed: Option<u64>,
}

/// Terminal result metadata delivered on successful completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMetadata {
    pub id: JobId,
    /// Terminal state string, `DONE` for every successful job.
    pub state: String,
    pub statistics: Option<JobStatistics>,
    /// When the terminal event was observed, RFC 3339.
    pub finished_at: String,
}

/// Observer notification emitted by the job watcher.
///
/// `Started` fires once after successful submission; `Completed` fires once
/// on success. Failed jobs surface through the watch result, not a notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum JobNotice {
    Started { id: JobId },
    Completed { id: JobId },
}
