// crates/types/src/lib.rs
//! Shared types for the bqops workspace: dataset/table references, operation
//! specs, and job lifecycle types. No I/O lives here.

mod format;
mod job;
mod ops;
mod reference;

pub use format::{FormatParseError, SourceFormat};
pub use job::{JobId, JobMetadata, JobNotice, JobPhase, JobSnapshot, JobStatistics};
pub use ops::{ColumnSpec, CopySpec, ExtractSpec, InsertReport, JobSpec, LoadSource, LoadSpec};
pub use reference::{DatasetRef, GcsUri, TableRef};
