// crates/client/src/warehouse.rs
//! The `Warehouse` trait: the seam between operation logic and the backing
//! warehouse/object-storage services.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::WarehouseError;
use bqops_types::{
    ColumnSpec, DatasetRef, GcsUri, InsertReport, JobId, JobSnapshot, JobSpec, TableRef,
};

/// A warehouse backend plus the object storage it loads from and exports to.
///
/// Implementations:
/// - `GcpWarehouse` — BigQuery + Cloud Storage over their REST clients
/// - `fake::FakeWarehouse` — in-memory, with scripted job outcomes, for tests
///
/// Clients are constructed once in `main` and passed in by handle; nothing in
/// this workspace reaches for ambient global state.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Create a table, optionally with an explicit column schema.
    async fn create_table(
        &self,
        table: &TableRef,
        schema: Option<&[ColumnSpec]>,
    ) -> Result<(), WarehouseError>;

    /// Delete a table.
    async fn delete_table(&self, table: &TableRef) -> Result<(), WarehouseError>;

    /// List table names in a dataset.
    async fn list_tables(&self, dataset: &DatasetRef) -> Result<Vec<String>, WarehouseError>;

    /// Read rows from a table, up to `max_rows` when given.
    async fn browse_rows(
        &self,
        table: &TableRef,
        max_rows: Option<u64>,
    ) -> Result<Vec<Value>, WarehouseError>;

    /// Stream-insert rows. Row-level validation (types, required fields) is
    /// the backend's job; a syntactically valid but semantically wrong row
    /// set still reaches this call.
    async fn insert_rows(
        &self,
        table: &TableRef,
        rows: &[Value],
    ) -> Result<InsertReport, WarehouseError>;

    /// Submit an asynchronous job. An `Err` here means no job exists and
    /// none was started.
    async fn submit_job(&self, spec: &JobSpec) -> Result<JobId, WarehouseError>;

    /// Fetch the current state of a previously submitted job.
    async fn poll_job(&self, id: &JobId) -> Result<JobSnapshot, WarehouseError>;

    /// Upload bytes to object storage, returning the resulting location.
    /// Used to stage local files before a load job.
    async fn stage_object(
        &self,
        bucket: &str,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<GcsUri, WarehouseError>;

    /// Backend name for logging/display (e.g. "gcp", "fake").
    fn name(&self) -> &str;
}
