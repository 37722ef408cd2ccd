// crates/types/src/ops.rs
//! Typed operation specs for the asynchronous warehouse jobs and for
//! streaming inserts. Each spec enumerates exactly the fields its operation
//! needs; there are no loose option bags.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{GcsUri, SourceFormat, TableRef};

/// A column in a table schema, as given on the command line (`name:type`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    /// Warehouse column type, e.g. `STRING`, `INTEGER`, `TIMESTAMP`.
    pub column_type: String,
}

/// Copy one table to another, creating the destination if needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopySpec {
    pub source: TableRef,
    pub dest: TableRef,
}

/// Where a load job reads its data from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadSource {
    /// An object already sitting in object storage.
    Gcs(GcsUri),
    /// A local file, staged through object storage before the load runs.
    Local(PathBuf),
}

/// Bulk-load a file into a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSpec {
    pub dest: TableRef,
    pub source: LoadSource,
    pub format: SourceFormat,
}

/// Export a table to object storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractSpec {
    pub source: TableRef,
    pub dest: GcsUri,
    pub format: SourceFormat,
    /// Gzip-compress the output. Only valid for JSON and CSV.
    pub gzip: bool,
}

/// Any operation the warehouse executes as a server-side job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobSpec {
    Copy(CopySpec),
    Load(LoadSpec),
    Extract(ExtractSpec),
}

impl JobSpec {
    /// Short label used in log fields and generated job ids.
    pub fn kind(&self) -> &'static str {
        match self {
            JobSpec::Copy(_) => "copy",
            JobSpec::Load(_) => "load",
            JobSpec::Extract(_) => "extract",
        }
    }
}

/// Outcome of a streaming insert: how many rows were sent and how many the
/// backend rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertReport {
    pub rows_sent: usize,
    pub rows_rejected: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_spec_kind() {
        let copy = JobSpec::Copy(CopySpec {
            source: TableRef::new("p", "a", "b"),
            dest: TableRef::new("p", "c", "d"),
        });
        assert_eq!(copy.kind(), "copy");

        let load = JobSpec::Load(LoadSpec {
            dest: TableRef::new("p", "d", "t"),
            source: LoadSource::Gcs(GcsUri::new("bkt", "data.json")),
            format: SourceFormat::Json,
        });
        assert_eq!(load.kind(), "load");

        let extract = JobSpec::Extract(ExtractSpec {
            source: TableRef::new("p", "d", "t"),
            dest: GcsUri::new("bkt", "out.csv"),
            format: SourceFormat::Csv,
            gzip: true,
        });
        assert_eq!(extract.kind(), "extract");
    }

    #[test]
    fn test_specs_serialize() {
        let spec = JobSpec::Load(LoadSpec {
            dest: TableRef::new("p", "d", "t"),
            source: LoadSource::Local(PathBuf::from("/tmp/rows.csv")),
            format: SourceFormat::Csv,
        });
        let json = serde_json::to_string(&spec).unwrap();
        let back: JobSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
    }
}
