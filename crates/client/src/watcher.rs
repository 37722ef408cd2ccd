// crates/client/src/watcher.rs
//! Watches a server-side job from submission to its single terminal event.
//!
//! The original callback-style contract ("invoke the completion callback
//! exactly once, with either an error or metadata") maps onto a
//! single-resolution future here: `run` resolves exactly once, and `spawn`
//! delivers the same outcome through a oneshot channel without blocking the
//! caller. Only one terminal event is ever meaningful, so there is no
//! general event emitter.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, oneshot};

use crate::error::WatchError;
use crate::warehouse::Warehouse;
use bqops_types::{JobMetadata, JobNotice, JobSpec};

/// Default interval between job state polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Drives copy/load/extract jobs to completion against a warehouse handle.
///
/// State machine per watched job:
/// `Submitted -> {Failed}` or `Submitted -> Running -> {Failed, Completed}`.
/// No state is revisited and the outcome resolves exactly once. This layer
/// never retries; transient failures are the backend's responsibility.
pub struct JobWatcher<W: Warehouse> {
    warehouse: Arc<W>,
    poll_interval: Duration,
    notices: broadcast::Sender<JobNotice>,
}

impl<W: Warehouse + 'static> JobWatcher<W> {
    pub fn new(warehouse: Arc<W>) -> Self {
        let (notices, _) = broadcast::channel(64);
        Self {
            warehouse,
            poll_interval: DEFAULT_POLL_INTERVAL,
            notices,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Subscribe to `Started`/`Completed` notices for all jobs this watcher
    /// drives.
    pub fn subscribe(&self) -> broadcast::Receiver<JobNotice> {
        self.notices.subscribe()
    }

    /// Submit `spec` and wait for its terminal outcome.
    ///
    /// Exactly one of three paths resolves:
    /// - submission failure: `Err(WatchError::Submit)`, no `Started` notice
    /// - job error: `Err(WatchError::Job)` after `Started`
    /// - completion: `Ok(metadata)` after `Started`, with a `Completed` notice
    pub async fn run(&self, spec: JobSpec) -> Result<JobMetadata, WatchError> {
        watch(
            Arc::clone(&self.warehouse),
            self.poll_interval,
            self.notices.clone(),
            spec,
        )
        .await
    }

    /// Submit `spec` without blocking the caller. The terminal outcome
    /// arrives on the returned ticket; dropping the ticket abandons the
    /// watch (the server-side job keeps running — there is no cancellation).
    pub fn spawn(&self, spec: JobSpec) -> JobTicket {
        let (tx, rx) = oneshot::channel();
        let warehouse = Arc::clone(&self.warehouse);
        let poll_interval = self.poll_interval;
        let notices = self.notices.clone();
        tokio::spawn(async move {
            let outcome = watch(warehouse, poll_interval, notices, spec).await;
            // Receiver may have been dropped; the job is abandoned, not cancelled.
            let _ = tx.send(outcome);
        });
        JobTicket { outcome: rx }
    }
}

/// Pending outcome of a spawned watch. Resolves exactly once.
pub struct JobTicket {
    outcome: oneshot::Receiver<Result<JobMetadata, WatchError>>,
}

impl JobTicket {
    /// Wait for the job's terminal outcome.
    pub async fn outcome(self) -> Result<JobMetadata, WatchError> {
        self.outcome.await.unwrap_or(Err(WatchError::Abandoned))
    }
}

/// Submission plus the poll loop. Shared by `run` and `spawn`.
async fn watch<W: Warehouse>(
    warehouse: Arc<W>,
    poll_interval: Duration,
    notices: broadcast::Sender<JobNotice>,
    spec: JobSpec,
) -> Result<JobMetadata, WatchError> {
    let kind = spec.kind();
    let id = warehouse
        .submit_job(&spec)
        .await
        .map_err(|source| WatchError::Submit { source })?;

    tracing::info!(job_id = %id, kind, backend = warehouse.name(), "Job started");
    let _ = notices.send(JobNotice::Started { id: id.clone() });

    loop {
        let snapshot = warehouse
            .poll_job(&id)
            .await
            .map_err(|source| WatchError::Poll {
                id: id.clone(),
                source,
            })?;

        if snapshot.is_terminal() {
            if let Some(message) = snapshot.error {
                tracing::warn!(job_id = %id, kind, error = %message, "Job failed");
                return Err(WatchError::Job { id, message });
            }
            let metadata = JobMetadata {
                id: id.clone(),
                state: "DONE".to_string(),
                statistics: snapshot.statistics,
                finished_at: chrono::Utc::now().to_rfc3339(),
            };
            tracing::info!(job_id = %id, kind, "Job completed");
            let _ = notices.send(JobNotice::Completed { id });
            return Ok(metadata);
        }

        tokio::time::sleep(poll_interval).await;
    }
}
