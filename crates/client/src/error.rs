// crates/client/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

use bqops_types::JobId;

/// Errors surfaced by a warehouse backend.
///
/// Backend failures are carried verbatim in `message`; this layer never
/// reclassifies or retries them.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("Table not found: {table}")]
    TableNotFound { table: String },

    #[error("Table already exists: {table}")]
    AlreadyExists { table: String },

    #[error("Dataset not found: {dataset}")]
    DatasetNotFound { dataset: String },

    #[error("Job not found: {id}")]
    JobNotFound { id: JobId },

    #[error("Backend rejected {rejected} of {sent} rows")]
    RowsRejected { sent: usize, rejected: usize },

    #[error("Authentication failure: {message}")]
    Auth { message: String },

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Backend error: {message}")]
    Backend { message: String },
}

impl WarehouseError {
    pub fn backend(message: impl std::fmt::Display) -> Self {
        Self::Backend {
            message: message.to_string(),
        }
    }

    pub fn auth(message: impl std::fmt::Display) -> Self {
        Self::Auth {
            message: message.to_string(),
        }
    }
}

/// Terminal error of a watched job: one of the three failure paths.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Submission itself failed; no job exists and none was started.
    #[error("Job submission failed: {source}")]
    Submit {
        #[source]
        source: WarehouseError,
    },

    /// The job ran and reached a terminal error state.
    #[error("Job {id} failed: {message}")]
    Job { id: JobId, message: String },

    /// Polling the job's state failed before a terminal event was observed.
    #[error("Polling job {id} failed: {source}")]
    Poll {
        id: JobId,
        #[source]
        source: WarehouseError,
    },

    /// The watch task was dropped before resolving. Should not happen in
    /// normal operation.
    #[error("Job watch ended without an outcome")]
    Abandoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warehouse_error_display() {
        let err = WarehouseError::TableNotFound {
            table: "p.d.t".to_string(),
        };
        assert!(err.to_string().contains("p.d.t"));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_watch_error_preserves_submit_source() {
        let err = WatchError::Submit {
            source: WarehouseError::backend("connection refused"),
        };
        assert!(err.to_string().contains("submission failed"));
        let source = std::error::Error::source(&err).expect("has source");
        assert!(source.to_string().contains("connection refused"));
    }

    #[test]
    fn test_watch_error_job_display() {
        let err = WatchError::Job {
            id: JobId("j3".into()),
            message: "quota exceeded".into(),
        };
        assert_eq!(err.to_string(), "Job j3 failed: quota exceeded");
    }
}
