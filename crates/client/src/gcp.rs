// crates/client/src/gcp.rs
//! `Warehouse` implementation backed by the BigQuery and Cloud Storage REST
//! clients. Every method is a direct mapping onto one vendor call; job
//! polling is the only place with any logic, and even that just translates
//! the vendor's job status into a `JobSnapshot`.

use async_trait::async_trait;
use serde_json::Value;

use google_cloud_bigquery::client::{Client as BqClient, ClientConfig as BqClientConfig};
use google_cloud_bigquery::http::job::get::GetJobRequest;
use google_cloud_bigquery::http::job::{
    Job, JobConfiguration, JobConfigurationExtract, JobConfigurationExtractSource,
    JobConfigurationLoad, JobConfigurationSourceTable, JobConfigurationTableCopy, JobReference,
    JobState, JobStatistics as BqJobStatistics, JobType,
};
use google_cloud_bigquery::http::table::list::ListTablesRequest;
use google_cloud_bigquery::http::table::{
    DestinationFormat, SourceFormat as BqSourceFormat, Table, TableFieldSchema, TableFieldType,
    TableReference, TableSchema,
};
use google_cloud_bigquery::http::tabledata::insert_all::{InsertAllRequest, Row as InsertRow};
use google_cloud_bigquery::http::tabledata::list::{FetchDataRequest, Tuple, Value as RawValue};
use google_cloud_storage::client::{Client as StorageClient, ClientConfig as StorageClientConfig};
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};

use crate::error::WarehouseError;
use crate::warehouse::Warehouse;
use bqops_types::{
    ColumnSpec, DatasetRef, GcsUri, InsertReport, JobId, JobPhase, JobSnapshot, JobSpec,
    JobStatistics, LoadSource, SourceFormat, TableRef,
};

/// BigQuery + Cloud Storage backend using ambient application-default
/// credentials. Constructed once in `main` and passed around by handle.
pub struct GcpWarehouse {
    bigquery: BqClient,
    storage: StorageClient,
    project: String,
    location: String,
}

impl GcpWarehouse {
    /// Authenticate and build both clients.
    ///
    /// The project id comes from the credentials unless overridden; the
    /// location is attached to every job reference so polling finds the job.
    pub async fn connect(
        project_override: Option<String>,
        location: impl Into<String>,
    ) -> Result<Self, WarehouseError> {
        // rustls needs exactly one crypto provider installed before the
        // first TLS handshake; we pin aws-lc-rs.
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let (config, detected_project) = BqClientConfig::new_with_auth()
            .await
            .map_err(WarehouseError::auth)?;
        let bigquery = BqClient::new(config).await.map_err(WarehouseError::auth)?;

        let storage_config = StorageClientConfig::default()
            .with_auth()
            .await
            .map_err(WarehouseError::auth)?;
        let storage = StorageClient::new(storage_config);

        let project = project_override.or(detected_project).ok_or_else(|| {
            WarehouseError::auth("no project id in credentials; set BQOPS_PROJECT")
        })?;

        Ok(Self {
            bigquery,
            storage,
            project,
            location: location.into(),
        })
    }

    /// The project jobs are submitted under.
    pub fn project(&self) -> &str {
        &self.project
    }

    fn job_reference(&self, kind: &str) -> JobReference {
        let millis = chrono::Utc::now().timestamp_millis();
        JobReference {
            project_id: self.project.clone(),
            job_id: format!("bqops_{kind}_{millis}"),
            location: Some(self.location.clone()),
        }
    }
}

fn table_reference(table: &TableRef) -> TableReference {
    TableReference {
        project_id: table.project.clone(),
        dataset_id: table.dataset.clone(),
        table_id: table.table.clone(),
    }
}

fn load_format(format: SourceFormat) -> BqSourceFormat {
    match format {
        SourceFormat::Json => BqSourceFormat::NewlineDelimitedJson,
        SourceFormat::Csv => BqSourceFormat::Csv,
        SourceFormat::Avro => BqSourceFormat::Avro,
    }
}

fn extract_format(format: SourceFormat) -> DestinationFormat {
    match format {
        SourceFormat::Json => DestinationFormat::NewlineDelimitedJson,
        SourceFormat::Csv => DestinationFormat::Csv,
        SourceFormat::Avro => DestinationFormat::Avro,
    }
}

fn job_type(spec: &JobSpec) -> Result<JobType, WarehouseError> {
    match spec {
        JobSpec::Copy(copy) => Ok(JobType::Copy(JobConfigurationTableCopy {
            source_table: JobConfigurationSourceTable::SourceTable(table_reference(&copy.source)),
            destination_table: table_reference(&copy.dest),
            ..Default::default()
        })),
        JobSpec::Load(load) => {
            let uri = match &load.source {
                LoadSource::Gcs(uri) => uri.to_string(),
                // Local sources are staged by the caller before submission.
                LoadSource::Local(path) => {
                    return Err(WarehouseError::backend(format!(
                        "local file {} must be staged to object storage before loading",
                        path.display()
                    )))
                }
            };
            Ok(JobType::Load(JobConfigurationLoad {
                destination_table: table_reference(&load.dest),
                source_uris: vec![uri],
                source_format: Some(load_format(load.format)),
                ..Default::default()
            }))
        }
        JobSpec::Extract(extract) => Ok(JobType::Extract(JobConfigurationExtract {
            destination_uris: vec![extract.dest.to_string()],
            destination_format: Some(extract_format(extract.format)),
            // The REST surface takes the compression type as a plain string.
            compression: extract.gzip.then(|| "GZIP".to_string()),
            source: JobConfigurationExtractSource::SourceTable(table_reference(&extract.source)),
            ..Default::default()
        })),
    }
}

/// tabledata.list caps page size at u32; larger limits saturate rather
/// than error.
fn fetch_limit(max_rows: Option<u64>) -> Option<u32> {
    max_rows.map(|n| u32::try_from(n).unwrap_or(u32::MAX))
}

/// Pick the throughput counters out of the vendor's per-kind statistics.
/// `None` when the backend reported nothing usable for this job kind.
fn job_statistics(stats: &BqJobStatistics) -> Option<JobStatistics> {
    let rows = stats.load.as_ref().and_then(|load| load.output_rows);
    let bytes = stats
        .load
        .as_ref()
        .and_then(|load| load.output_bytes)
        .or_else(|| stats.extract.as_ref().and_then(|extract| extract.input_bytes))
        .or(stats.total_bytes_processed);
    if rows.is_none() && bytes.is_none() {
        return None;
    }
    Some(JobStatistics {
        rows_processed: rows.and_then(|n| u64::try_from(n).ok()),
        bytes_processed: bytes.and_then(|n| u64::try_from(n).ok()),
    })
}

/// Render one tabledata cell as JSON. The REST surface returns every scalar
/// as a string; nested records and repeated fields come back as structs and
/// arrays. Record cells take their key names from the column's nested schema.
fn cell_to_json(field: &TableFieldSchema, value: &RawValue) -> Value {
    match value {
        RawValue::Null => Value::Null,
        RawValue::String(s) => Value::String(s.clone()),
        RawValue::Array(cells) => Value::Array(
            cells.iter().map(|c| cell_to_json(field, &c.v)).collect(),
        ),
        RawValue::Struct(tuple) => match &field.fields {
            Some(nested) => tuple_to_json(nested, tuple),
            // A struct cell with no nested schema has no names to offer.
            None => Value::Array(
                tuple.f.iter().map(|c| cell_to_json(field, &c.v)).collect(),
            ),
        },
    }
}

fn tuple_to_json(fields: &[TableFieldSchema], tuple: &Tuple) -> Value {
    let mut row = serde_json::Map::new();
    for (field, cell) in fields.iter().zip(tuple.f.iter()) {
        row.insert(field.name.clone(), cell_to_json(field, &cell.v));
    }
    Value::Object(row)
}

fn column_field(column: &ColumnSpec) -> TableFieldSchema {
    let data_type = match column.column_type.to_ascii_uppercase().as_str() {
        "STRING" => TableFieldType::String,
        "BYTES" => TableFieldType::Bytes,
        "INTEGER" | "INT64" => TableFieldType::Integer,
        "FLOAT" | "FLOAT64" => TableFieldType::Float,
        "NUMERIC" => TableFieldType::Numeric,
        "BOOLEAN" | "BOOL" => TableFieldType::Boolean,
        "TIMESTAMP" => TableFieldType::Timestamp,
        "DATE" => TableFieldType::Date,
        "TIME" => TableFieldType::Time,
        "DATETIME" => TableFieldType::Datetime,
        "JSON" => TableFieldType::Json,
        _ => TableFieldType::String,
    };
    TableFieldSchema {
        name: column.name.clone(),
        data_type,
        ..Default::default()
    }
}

#[async_trait]
impl Warehouse for GcpWarehouse {
    async fn create_table(
        &self,
        table: &TableRef,
        schema: Option<&[ColumnSpec]>,
    ) -> Result<(), WarehouseError> {
        let metadata = Table {
            table_reference: table_reference(table),
            schema: schema.map(|columns| TableSchema {
                fields: columns.iter().map(column_field).collect(),
            }),
            ..Default::default()
        };
        self.bigquery
            .table()
            .create(&metadata)
            .await
            .map_err(WarehouseError::backend)?;
        Ok(())
    }

    async fn delete_table(&self, table: &TableRef) -> Result<(), WarehouseError> {
        self.bigquery
            .table()
            .delete(&table.project, &table.dataset, &table.table)
            .await
            .map_err(WarehouseError::backend)
    }

    async fn list_tables(&self, dataset: &DatasetRef) -> Result<Vec<String>, WarehouseError> {
        let tables = self
            .bigquery
            .table()
            .list(
                &dataset.project,
                &dataset.dataset,
                &ListTablesRequest::default(),
            )
            .await
            .map_err(WarehouseError::backend)?;
        Ok(tables
            .into_iter()
            .map(|t| t.table_reference.table_id)
            .collect())
    }

    async fn browse_rows(
        &self,
        table: &TableRef,
        max_rows: Option<u64>,
    ) -> Result<Vec<Value>, WarehouseError> {
        // Field names come from the table schema; tabledata rows are
        // positional.
        let metadata = self
            .bigquery
            .table()
            .get(&table.project, &table.dataset, &table.table)
            .await
            .map_err(WarehouseError::backend)?;
        let fields = metadata.schema.map(|s| s.fields).unwrap_or_default();

        let request = FetchDataRequest {
            max_results: fetch_limit(max_rows),
            ..Default::default()
        };
        let data = self
            .bigquery
            .tabledata()
            .read(&table.project, &table.dataset, &table.table, &request)
            .await
            .map_err(WarehouseError::backend)?;

        Ok(data
            .rows
            .unwrap_or_default()
            .iter()
            .map(|tuple| tuple_to_json(&fields, tuple))
            .collect())
    }

    async fn insert_rows(
        &self,
        table: &TableRef,
        rows: &[Value],
    ) -> Result<InsertReport, WarehouseError> {
        let request = InsertAllRequest {
            rows: rows
                .iter()
                .map(|row| InsertRow {
                    insert_id: None,
                    json: row.clone(),
                })
                .collect(),
            ..Default::default()
        };
        let response = self
            .bigquery
            .tabledata()
            .insert(&table.project, &table.dataset, &table.table, &request)
            .await
            .map_err(WarehouseError::backend)?;

        let rejected = response
            .insert_errors
            .map(|errors| errors.len())
            .unwrap_or(0);
        Ok(InsertReport {
            rows_sent: rows.len(),
            rows_rejected: rejected,
        })
    }

    async fn submit_job(&self, spec: &JobSpec) -> Result<JobId, WarehouseError> {
        let job = Job {
            job_reference: self.job_reference(spec.kind()),
            configuration: JobConfiguration {
                job: job_type(spec)?,
                ..Default::default()
            },
            ..Default::default()
        };
        let created = self
            .bigquery
            .job()
            .create(&job)
            .await
            .map_err(WarehouseError::backend)?;

        // A job the backend refuses outright is a submission failure, even
        // when create() itself returned 200.
        if let Some(error) = created.status.error_result {
            return Err(WarehouseError::backend(error.message.unwrap_or_else(|| {
                "job rejected without an error message".to_string()
            })));
        }
        Ok(JobId(created.job_reference.job_id))
    }

    async fn poll_job(&self, id: &JobId) -> Result<JobSnapshot, WarehouseError> {
        let request = GetJobRequest {
            location: Some(self.location.clone()),
        };
        let job = self
            .bigquery
            .job()
            .get(&self.project, id.as_str(), &request)
            .await
            .map_err(WarehouseError::backend)?;

        let phase = match job.status.state {
            JobState::Pending => JobPhase::Pending,
            JobState::Running => JobPhase::Running,
            JobState::Done => JobPhase::Done,
        };
        let error = job
            .status
            .error_result
            .map(|e| e.message.unwrap_or_else(|| "job failed".to_string()));

        Ok(JobSnapshot {
            id: id.clone(),
            phase,
            error,
            statistics: job.statistics.as_ref().and_then(job_statistics),
        })
    }

    async fn stage_object(
        &self,
        bucket: &str,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<GcsUri, WarehouseError> {
        let request = UploadObjectRequest {
            bucket: bucket.to_string(),
            ..Default::default()
        };
        let media = Media::new(name.to_string());
        self.storage
            .upload_object(&request, bytes, &UploadType::Simple(media))
            .await
            .map_err(WarehouseError::backend)?;
        Ok(GcsUri::new(bucket, name))
    }

    fn name(&self) -> &str {
        "gcp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_type_rejects_unstaged_local_load() {
        let spec = JobSpec::Load(bqops_types::LoadSpec {
            dest: TableRef::new("p", "d", "t"),
            source: LoadSource::Local("/tmp/rows.csv".into()),
            format: SourceFormat::Csv,
        });
        let err = job_type(&spec).unwrap_err();
        assert!(err.to_string().contains("staged"));
    }

    #[test]
    fn test_extract_compression_follows_gzip_flag() {
        let spec = JobSpec::Extract(bqops_types::ExtractSpec {
            source: TableRef::new("p", "d", "t"),
            dest: GcsUri::new("bkt", "out.csv"),
            format: SourceFormat::Csv,
            gzip: true,
        });
        match job_type(&spec).unwrap() {
            JobType::Extract(config) => {
                assert_eq!(config.compression.as_deref(), Some("GZIP"));
                assert_eq!(config.destination_uris, vec!["gs://bkt/out.csv".to_string()]);
                match config.source {
                    JobConfigurationExtractSource::SourceTable(table) => {
                        assert_eq!(table.table_id, "t");
                    }
                    other => panic!("expected a table source, got {other:?}"),
                }
            }
            other => panic!("expected extract configuration, got {other:?}"),
        }
    }

    #[test]
    fn test_copy_job_type_maps_tables() {
        let spec = JobSpec::Copy(bqops_types::CopySpec {
            source: TableRef::new("p", "a", "b"),
            dest: TableRef::new("p", "c", "d"),
        });
        match job_type(&spec).unwrap() {
            JobType::Copy(config) => {
                match config.source_table {
                    JobConfigurationSourceTable::SourceTable(table) => {
                        assert_eq!(table.table_id, "b");
                    }
                    other => panic!("expected a single source table, got {other:?}"),
                }
                assert_eq!(config.destination_table.table_id, "d");
            }
            other => panic!("expected copy configuration, got {other:?}"),
        }
    }

    #[test]
    fn test_fetch_limit_saturates_at_u32_max() {
        assert_eq!(fetch_limit(None), None);
        assert_eq!(fetch_limit(Some(10)), Some(10));
        assert_eq!(fetch_limit(Some(u64::from(u32::MAX) + 1)), Some(u32::MAX));
    }

    #[test]
    fn test_job_statistics_maps_load_counters() {
        let stats = BqJobStatistics {
            load: Some(google_cloud_bigquery::http::job::JobStatisticsLoad {
                output_rows: Some(42),
                output_bytes: Some(1024),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            job_statistics(&stats),
            Some(JobStatistics {
                rows_processed: Some(42),
                bytes_processed: Some(1024),
            })
        );
    }

    #[test]
    fn test_job_statistics_absent_counters_report_none() {
        assert_eq!(job_statistics(&BqJobStatistics::default()), None);
    }

    #[test]
    fn test_record_cell_renders_with_nested_field_names() {
        use google_cloud_bigquery::http::tabledata::list::Cell;
        use serde_json::json;

        let fields = vec![
            TableFieldSchema {
                name: "name".to_string(),
                data_type: TableFieldType::String,
                ..Default::default()
            },
            TableFieldSchema {
                name: "address".to_string(),
                data_type: TableFieldType::Record,
                fields: Some(vec![
                    TableFieldSchema {
                        name: "city".to_string(),
                        data_type: TableFieldType::String,
                        ..Default::default()
                    },
                    TableFieldSchema {
                        name: "zip".to_string(),
                        data_type: TableFieldType::String,
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            },
        ];
        let tuple = Tuple {
            f: vec![
                Cell {
                    v: RawValue::String("ada".to_string()),
                },
                Cell {
                    v: RawValue::Struct(Tuple {
                        f: vec![
                            Cell {
                                v: RawValue::String("berlin".to_string()),
                            },
                            Cell {
                                v: RawValue::String("10115".to_string()),
                            },
                        ],
                    }),
                },
            ],
        };

        let row = tuple_to_json(&fields, &tuple);
        assert_eq!(
            row,
            json!({"name": "ada", "address": {"city": "berlin", "zip": "10115"}})
        );
    }
}
