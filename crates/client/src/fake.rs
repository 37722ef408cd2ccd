// crates/client/src/fake.rs
//! In-memory `Warehouse` used by unit and CLI tests. Tables live in a hash
//! map, job outcomes follow a script, and every call is counted so tests can
//! assert that a path did (or did not) reach the backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::WarehouseError;
use crate::warehouse::Warehouse;
use bqops_types::{
    ColumnSpec, DatasetRef, GcsUri, InsertReport, JobId, JobPhase, JobSnapshot, JobSpec,
    JobStatistics, TableRef,
};

/// How scripted jobs behave.
#[derive(Debug, Clone)]
pub enum JobScript {
    /// Submission succeeds; the job reports `Done` on the Nth poll.
    CompleteAfter(u32),
    /// Submission itself fails with this message; no job is created.
    FailAtSubmit(String),
    /// Submission succeeds; the first poll reports a terminal error.
    FailWhileRunning(String),
}

/// Per-call counters, readable from tests.
#[derive(Debug, Default)]
pub struct CallLog {
    creates: AtomicUsize,
    deletes: AtomicUsize,
    lists: AtomicUsize,
    browses: AtomicUsize,
    inserts: AtomicUsize,
    submits: AtomicUsize,
    polls: AtomicUsize,
    stages: AtomicUsize,
}

impl CallLog {
    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::Relaxed)
    }

    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::Relaxed)
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::Relaxed)
    }

    pub fn stages(&self) -> usize {
        self.stages.load(Ordering::Relaxed)
    }

    /// Every backend call of any kind. Zero means nothing hit the network.
    pub fn total(&self) -> usize {
        self.creates.load(Ordering::Relaxed)
            + self.deletes.load(Ordering::Relaxed)
            + self.lists.load(Ordering::Relaxed)
            + self.browses.load(Ordering::Relaxed)
            + self.inserts()
            + self.submits()
            + self.polls()
            + self.stages()
    }

    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

struct JobRecord {
    spec: JobSpec,
    polls_remaining: u32,
    fail_message: Option<String>,
}

#[derive(Default)]
struct State {
    /// `project.dataset` -> table name -> rows.
    tables: HashMap<String, BTreeMap<String, Vec<Value>>>,
    jobs: HashMap<String, JobRecord>,
    staged: Vec<GcsUri>,
    next_job: u64,
}

/// In-memory warehouse with scripted job behavior.
pub struct FakeWarehouse {
    state: Mutex<State>,
    script: JobScript,
    pub calls: CallLog,
}

impl FakeWarehouse {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            script: JobScript::CompleteAfter(1),
            calls: CallLog::default(),
        }
    }

    pub fn with_job_script(mut self, script: JobScript) -> Self {
        self.script = script;
        self
    }

    /// Seed a table with rows, bypassing the call counters.
    pub fn seed_table(&self, table: &TableRef, rows: Vec<Value>) {
        let mut state = self.lock();
        state
            .tables
            .entry(dataset_key(&table.dataset_ref()))
            .or_default()
            .insert(table.table.clone(), rows);
    }

    /// Rows currently stored for a table, if it exists.
    pub fn table_rows(&self, table: &TableRef) -> Option<Vec<Value>> {
        let state = self.lock();
        state
            .tables
            .get(&dataset_key(&table.dataset_ref()))
            .and_then(|ds| ds.get(&table.table).cloned())
    }

    /// Objects staged through `stage_object`.
    pub fn staged_objects(&self) -> Vec<GcsUri> {
        self.lock().staged.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply the side effect of a finished job to the stored tables.
    fn settle_job(state: &mut State, spec: &JobSpec) -> u64 {
        match spec {
            JobSpec::Copy(copy) => {
                let rows = state
                    .tables
                    .get(&dataset_key(&copy.source.dataset_ref()))
                    .and_then(|ds| ds.get(&copy.source.table).cloned())
                    .unwrap_or_default();
                let count = rows.len() as u64;
                state
                    .tables
                    .entry(dataset_key(&copy.dest.dataset_ref()))
                    .or_default()
                    .insert(copy.dest.table.clone(), rows);
                count
            }
            JobSpec::Load(load) => {
                state
                    .tables
                    .entry(dataset_key(&load.dest.dataset_ref()))
                    .or_default()
                    .entry(load.dest.table.clone())
                    .or_default();
                0
            }
            JobSpec::Extract(extract) => {
                state.staged.push(extract.dest.clone());
                state
                    .tables
                    .get(&dataset_key(&extract.source.dataset_ref()))
                    .and_then(|ds| ds.get(&extract.source.table))
                    .map(|rows| rows.len() as u64)
                    .unwrap_or(0)
            }
        }
    }
}

impl Default for FakeWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

fn dataset_key(dataset: &DatasetRef) -> String {
    format!("{}.{}", dataset.project, dataset.dataset)
}

#[async_trait]
impl Warehouse for FakeWarehouse {
    async fn create_table(
        &self,
        table: &TableRef,
        _schema: Option<&[ColumnSpec]>,
    ) -> Result<(), WarehouseError> {
        CallLog::bump(&self.calls.creates);
        let mut state = self.lock();
        let dataset = state.tables.entry(dataset_key(&table.dataset_ref())).or_default();
        if dataset.contains_key(&table.table) {
            return Err(WarehouseError::AlreadyExists {
                table: table.to_string(),
            });
        }
        dataset.insert(table.table.clone(), Vec::new());
        Ok(())
    }

    async fn delete_table(&self, table: &TableRef) -> Result<(), WarehouseError> {
        CallLog::bump(&self.calls.deletes);
        let mut state = self.lock();
        let removed = state
            .tables
            .get_mut(&dataset_key(&table.dataset_ref()))
            .and_then(|ds| ds.remove(&table.table));
        match removed {
            Some(_) => Ok(()),
            None => Err(WarehouseError::TableNotFound {
                table: table.to_string(),
            }),
        }
    }

    async fn list_tables(&self, dataset: &DatasetRef) -> Result<Vec<String>, WarehouseError> {
        CallLog::bump(&self.calls.lists);
        let state = self.lock();
        Ok(state
            .tables
            .get(&dataset_key(dataset))
            .map(|ds| ds.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn browse_rows(
        &self,
        table: &TableRef,
        max_rows: Option<u64>,
    ) -> Result<Vec<Value>, WarehouseError> {
        CallLog::bump(&self.calls.browses);
        let state = self.lock();
        let rows = state
            .tables
            .get(&dataset_key(&table.dataset_ref()))
            .and_then(|ds| ds.get(&table.table))
            .ok_or_else(|| WarehouseError::TableNotFound {
                table: table.to_string(),
            })?;
        let limit = max_rows.map(|m| m as usize).unwrap_or(rows.len());
        Ok(rows.iter().take(limit).cloned().collect())
    }

    async fn insert_rows(
        &self,
        table: &TableRef,
        rows: &[Value],
    ) -> Result<InsertReport, WarehouseError> {
        CallLog::bump(&self.calls.inserts);
        let mut state = self.lock();
        let stored = state
            .tables
            .entry(dataset_key(&table.dataset_ref()))
            .or_default()
            .entry(table.table.clone())
            .or_default();
        // The real backend rejects rows that are not objects; mirror that so
        // semantically wrong input is accepted here and flagged in the report.
        let mut rejected = 0;
        for row in rows {
            if row.is_object() {
                stored.push(row.clone());
            } else {
                rejected += 1;
            }
        }
        Ok(InsertReport {
            rows_sent: rows.len(),
            rows_rejected: rejected,
        })
    }

    async fn submit_job(&self, spec: &JobSpec) -> Result<JobId, WarehouseError> {
        CallLog::bump(&self.calls.submits);
        let (polls_remaining, fail_message) = match &self.script {
            JobScript::FailAtSubmit(message) => {
                return Err(WarehouseError::backend(message));
            }
            JobScript::CompleteAfter(polls) => (*polls, None),
            JobScript::FailWhileRunning(message) => (1, Some(message.clone())),
        };

        let mut state = self.lock();
        state.next_job += 1;
        let id = format!("fake_{}_{}", spec.kind(), state.next_job);
        state.jobs.insert(
            id.clone(),
            JobRecord {
                spec: spec.clone(),
                polls_remaining,
                fail_message,
            },
        );
        Ok(JobId(id))
    }

    async fn poll_job(&self, id: &JobId) -> Result<JobSnapshot, WarehouseError> {
        CallLog::bump(&self.calls.polls);
        let mut state = self.lock();
        let record = state
            .jobs
            .get_mut(id.as_str())
            .ok_or_else(|| WarehouseError::JobNotFound { id: id.clone() })?;

        record.polls_remaining = record.polls_remaining.saturating_sub(1);
        if record.polls_remaining > 0 {
            return Ok(JobSnapshot {
                id: id.clone(),
                phase: JobPhase::Running,
                error: None,
                statistics: None,
            });
        }

        if let Some(message) = record.fail_message.clone() {
            return Ok(JobSnapshot {
                id: id.clone(),
                phase: JobPhase::Done,
                error: Some(message),
                statistics: None,
            });
        }

        let spec = record.spec.clone();
        let rows = Self::settle_job(&mut state, &spec);
        Ok(JobSnapshot {
            id: id.clone(),
            phase: JobPhase::Done,
            error: None,
            statistics: Some(JobStatistics {
                rows_processed: Some(rows),
                bytes_processed: None,
            }),
        })
    }

    async fn stage_object(
        &self,
        bucket: &str,
        name: &str,
        _bytes: Vec<u8>,
    ) -> Result<GcsUri, WarehouseError> {
        CallLog::bump(&self.calls.stages);
        let uri = GcsUri::new(bucket, name);
        self.lock().staged.push(uri.clone());
        Ok(uri)
    }

    fn name(&self) -> &str {
        "fake"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bqops_types::CopySpec;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn table() -> TableRef {
        TableRef::new("proj", "ds", "tbl")
    }

    #[tokio::test]
    async fn test_create_list_delete_roundtrip() {
        let fake = FakeWarehouse::new();
        let dataset = DatasetRef::new("proj", "ds");

        fake.create_table(&table(), None).await.unwrap();
        assert_eq!(fake.list_tables(&dataset).await.unwrap(), vec!["tbl"]);

        fake.delete_table(&table()).await.unwrap();
        assert!(fake.list_tables(&dataset).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_duplicate_rejected() {
        let fake = FakeWarehouse::new();
        fake.create_table(&table(), None).await.unwrap();
        let err = fake.create_table(&table(), None).await.unwrap_err();
        assert!(matches!(err, WarehouseError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_delete_missing_table() {
        let fake = FakeWarehouse::new();
        let err = fake.delete_table(&table()).await.unwrap_err();
        assert!(matches!(err, WarehouseError::TableNotFound { .. }));
    }

    #[tokio::test]
    async fn test_insert_rejects_non_object_rows() {
        let fake = FakeWarehouse::new();
        let rows = vec![json!({"name": "ada"}), json!(1), json!(2)];
        let report = fake.insert_rows(&table(), &rows).await.unwrap();
        assert_eq!(report.rows_sent, 3);
        assert_eq!(report.rows_rejected, 2);
        assert_eq!(fake.table_rows(&table()).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_browse_respects_max_rows() {
        let fake = FakeWarehouse::new();
        fake.seed_table(&table(), vec![json!({"n": 1}), json!({"n": 2}), json!({"n": 3})]);
        let rows = fake.browse_rows(&table(), Some(2)).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_completed_copy_moves_rows() {
        let fake = FakeWarehouse::new();
        let source = TableRef::new("proj", "a", "b");
        let dest = TableRef::new("proj", "c", "d");
        fake.seed_table(&source, vec![json!({"n": 1}), json!({"n": 2})]);

        let id = fake
            .submit_job(&JobSpec::Copy(CopySpec {
                source: source.clone(),
                dest: dest.clone(),
            }))
            .await
            .unwrap();
        let snapshot = fake.poll_job(&id).await.unwrap();
        assert!(snapshot.is_terminal());
        assert_eq!(
            snapshot.statistics.unwrap().rows_processed,
            Some(2)
        );
        assert_eq!(fake.table_rows(&dest).unwrap().len(), 2);
    }
}
