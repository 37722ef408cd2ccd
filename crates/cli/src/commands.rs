// crates/cli/src/commands.rs
//! Command handlers. Each one is a thin bridge from parsed arguments to a
//! `Warehouse` call; copy/import/export go through the job watcher and print
//! `Job <id> started/completed` status lines as the notices arrive.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use thiserror::Error;

use bqops_client::{JobWatcher, WarehouseError, Warehouse, WatchError};
use bqops_types::{
    ColumnSpec, CopySpec, DatasetRef, ExtractSpec, GcsUri, InsertReport, JobMetadata, JobNotice,
    JobSpec, LoadSource, LoadSpec, SourceFormat, TableRef,
};

use crate::args::Command;
use crate::config::Config;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Invalid rows argument: {0}")]
    InvalidRows(String),

    #[error("Invalid column '{0}' (expected NAME:TYPE)")]
    InvalidColumn(String),

    #[error("--gzip is not supported for AVRO exports")]
    GzipUnsupported,

    #[error("No staging bucket configured; pass --bucket or set BQOPS_STAGING_BUCKET")]
    NoStagingBucket,

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Watch(#[from] WatchError),
}

/// A connected warehouse plus everything the handlers need: the job watcher,
/// the resolved project id, and staging configuration.
pub struct App<W: Warehouse + 'static> {
    warehouse: Arc<W>,
    watcher: JobWatcher<W>,
    project: String,
    staging_bucket: Option<String>,
    show_progress: bool,
}

impl<W: Warehouse + 'static> App<W> {
    pub fn new(warehouse: Arc<W>, project: impl Into<String>, config: &Config) -> Self {
        let watcher =
            JobWatcher::new(Arc::clone(&warehouse)).with_poll_interval(config.poll_interval);
        Self {
            warehouse,
            watcher,
            project: project.into(),
            staging_bucket: config.staging_bucket.clone(),
            show_progress: false,
        }
    }

    /// Show a spinner while waiting for jobs. Off by default so tests and
    /// piped output stay clean.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub async fn dispatch(&self, command: Command) -> Result<(), CommandError> {
        match command {
            Command::Create {
                dataset,
                table,
                columns,
            } => self.create(&dataset, &table, &columns).await,
            Command::List { dataset } => self.list(&dataset).await.map(|_| ()),
            Command::Delete { dataset, table } => self.delete(&dataset, &table).await,
            Command::Copy {
                src_dataset,
                src_table,
                dest_dataset,
                dest_table,
            } => self
                .copy(&src_dataset, &src_table, &dest_dataset, &dest_table)
                .await
                .map(|_| ()),
            Command::Browse {
                dataset,
                table,
                max_rows,
            } => self.browse(&dataset, &table, max_rows).await.map(|_| ()),
            Command::Import {
                dataset,
                table,
                file,
                bucket,
                format,
            } => self
                .import(&dataset, &table, &file, bucket.as_deref(), format)
                .await
                .map(|_| ()),
            Command::Export {
                dataset,
                table,
                bucket,
                file,
                format,
                gzip,
            } => self
                .export(&dataset, &table, &bucket, &file, format, gzip)
                .await
                .map(|_| ()),
            Command::Insert {
                dataset,
                table,
                json_or_file,
            } => self.insert(&dataset, &table, &json_or_file).await.map(|_| ()),
        }
    }

    pub async fn create(
        &self,
        dataset: &str,
        table: &str,
        columns: &[String],
    ) -> Result<(), CommandError> {
        let columns = columns
            .iter()
            .map(|c| parse_column(c))
            .collect::<Result<Vec<_>, _>>()?;
        let table_ref = TableRef::new(&self.project, dataset, table);
        let schema = (!columns.is_empty()).then_some(columns.as_slice());
        self.warehouse.create_table(&table_ref, schema).await?;
        println!("Table {table_ref} created.");
        Ok(())
    }

    pub async fn list(&self, dataset: &str) -> Result<Vec<String>, CommandError> {
        let dataset_ref = DatasetRef::new(&self.project, dataset);
        let tables = self.warehouse.list_tables(&dataset_ref).await?;
        println!("{} tables in {dataset_ref}:", tables.len());
        for name in &tables {
            println!("{name}");
        }
        Ok(tables)
    }

    pub async fn delete(&self, dataset: &str, table: &str) -> Result<(), CommandError> {
        let table_ref = TableRef::new(&self.project, dataset, table);
        self.warehouse.delete_table(&table_ref).await?;
        println!("Table {table_ref} deleted.");
        Ok(())
    }

    pub async fn copy(
        &self,
        src_dataset: &str,
        src_table: &str,
        dest_dataset: &str,
        dest_table: &str,
    ) -> Result<JobMetadata, CommandError> {
        let spec = JobSpec::Copy(CopySpec {
            source: TableRef::new(&self.project, src_dataset, src_table),
            dest: TableRef::new(&self.project, dest_dataset, dest_table),
        });
        self.run_job(spec).await
    }

    pub async fn browse(
        &self,
        dataset: &str,
        table: &str,
        max_rows: Option<u64>,
    ) -> Result<Vec<Value>, CommandError> {
        let table_ref = TableRef::new(&self.project, dataset, table);
        let rows = self.warehouse.browse_rows(&table_ref, max_rows).await?;
        println!("{} rows from {table_ref}:", rows.len());
        for row in &rows {
            println!("{row}");
        }
        Ok(rows)
    }

    pub async fn import(
        &self,
        dataset: &str,
        table: &str,
        file: &str,
        bucket: Option<&str>,
        format: SourceFormat,
    ) -> Result<JobMetadata, CommandError> {
        let dest = TableRef::new(&self.project, dataset, table);
        let source = match bucket {
            // File already sits in object storage.
            Some(bucket) => LoadSource::Gcs(GcsUri::new(bucket, file)),
            // Local file: stage it through the configured bucket first.
            None => {
                let staging = self
                    .staging_bucket
                    .as_deref()
                    .ok_or(CommandError::NoStagingBucket)?;
                let path = Path::new(file);
                let bytes = std::fs::read(path).map_err(|source| CommandError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                let object = format!("bqops-staging/{}", file_name(path));
                let uri = self.warehouse.stage_object(staging, &object, bytes).await?;
                println!("Staged {} to {uri}.", path.display());
                LoadSource::Gcs(uri)
            }
        };
        self.run_job(JobSpec::Load(LoadSpec {
            dest,
            source,
            format,
        }))
        .await
    }

    pub async fn export(
        &self,
        dataset: &str,
        table: &str,
        bucket: &str,
        file: &str,
        format: SourceFormat,
        gzip: bool,
    ) -> Result<JobMetadata, CommandError> {
        if gzip && !format.supports_gzip() {
            return Err(CommandError::GzipUnsupported);
        }
        let spec = JobSpec::Extract(ExtractSpec {
            source: TableRef::new(&self.project, dataset, table),
            dest: GcsUri::new(bucket, file),
            format,
            gzip,
        });
        self.run_job(spec).await
    }

    pub async fn insert(
        &self,
        dataset: &str,
        table: &str,
        json_or_file: &str,
    ) -> Result<InsertReport, CommandError> {
        // Parse before touching the network; malformed input never leaves
        // this process.
        let rows = parse_rows_arg(json_or_file)?;
        let table_ref = TableRef::new(&self.project, dataset, table);
        let report = self.warehouse.insert_rows(&table_ref, &rows).await?;
        if report.rows_rejected > 0 {
            return Err(WarehouseError::RowsRejected {
                sent: report.rows_sent,
                rejected: report.rows_rejected,
            }
            .into());
        }
        println!("Inserted {} rows into {table_ref}.", report.rows_sent);
        Ok(report)
    }

    /// Spawn a watched job and relay its notices to stdout while waiting for
    /// the terminal outcome.
    async fn run_job(&self, spec: JobSpec) -> Result<JobMetadata, CommandError> {
        let mut notices = self.watcher.subscribe();
        let ticket = self.watcher.spawn(spec);
        let outcome = ticket.outcome();
        tokio::pin!(outcome);

        let mut spinner: Option<ProgressBar> = None;
        let mut started = false;
        loop {
            tokio::select! {
                result = &mut outcome => {
                    // The Started notice may still be queued when the outcome
                    // lands; drain it so the lines keep their order.
                    while !started {
                        match notices.try_recv() {
                            Ok(JobNotice::Started { id }) => {
                                println!("Job {id} started.");
                                started = true;
                            }
                            Ok(_) => continue,
                            Err(_) => break,
                        }
                    }
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    let metadata = result?;
                    println!("Job {} completed.", metadata.id);
                    return Ok(metadata);
                }
                notice = notices.recv() => {
                    if let Ok(JobNotice::Started { id }) = notice {
                        if !started {
                            println!("Job {id} started.");
                            started = true;
                            if self.show_progress {
                                spinner = Some(job_spinner());
                            }
                        }
                    }
                }
            }
        }
    }
}

fn job_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner} Waiting for job...")
            .expect("valid spinner template"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string()
}

fn parse_column(spec: &str) -> Result<ColumnSpec, CommandError> {
    match spec.split_once(':') {
        Some((name, column_type)) if !name.is_empty() && !column_type.is_empty() => {
            Ok(ColumnSpec {
                name: name.to_string(),
                column_type: column_type.to_string(),
            })
        }
        _ => Err(CommandError::InvalidColumn(spec.to_string())),
    }
}

/// Resolve the `insert` argument: a JSON array literal, or a path to a file
/// containing one. Anything else is an error before any network call.
fn parse_rows_arg(arg: &str) -> Result<Vec<Value>, CommandError> {
    match serde_json::from_str::<Value>(arg) {
        Ok(Value::Array(rows)) => Ok(rows),
        Ok(_) => Err(CommandError::InvalidRows(
            "input is valid JSON but not an array".to_string(),
        )),
        Err(_) => {
            let path = Path::new(arg);
            let text = std::fs::read_to_string(path).map_err(|source| CommandError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            match serde_json::from_str::<Value>(&text) {
                Ok(Value::Array(rows)) => Ok(rows),
                Ok(_) => Err(CommandError::InvalidRows(format!(
                    "{} is valid JSON but not an array",
                    path.display()
                ))),
                Err(e) => Err(CommandError::InvalidRows(format!(
                    "{} does not contain a JSON array: {e}",
                    path.display()
                ))),
            }
        }
    }
}
