// crates/cli/src/args.rs
//! Command-line argument definitions.

use clap::{Parser, Subcommand};

use bqops_types::SourceFormat;

/// Table operations for a BigQuery project.
#[derive(Debug, Parser)]
#[command(name = "bqops", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a table.
    Create {
        dataset: String,
        table: String,
        /// Column as NAME:TYPE; repeat for more columns. Omit to create a
        /// schemaless table.
        #[arg(long = "column", value_name = "NAME:TYPE")]
        columns: Vec<String>,
    },

    /// List tables in a dataset.
    List { dataset: String },

    /// Delete a table.
    Delete { dataset: String, table: String },

    /// Copy a table to a new destination table.
    Copy {
        src_dataset: String,
        src_table: String,
        dest_dataset: String,
        dest_table: String,
    },

    /// Print rows from a table.
    Browse {
        dataset: String,
        table: String,
        /// Stop after this many rows.
        #[arg(short = 'n', long)]
        max_rows: Option<u64>,
    },

    /// Bulk-load a file into a table.
    Import {
        dataset: String,
        table: String,
        /// Object name when --bucket is given, local path otherwise.
        file: String,
        /// Read <FILE> from this object-storage bucket instead of disk.
        #[arg(short, long)]
        bucket: Option<String>,
        #[arg(short, long, default_value = "json")]
        format: SourceFormat,
    },

    /// Export a table to object storage.
    Export {
        dataset: String,
        table: String,
        bucket: String,
        file: String,
        #[arg(short, long, default_value = "json")]
        format: SourceFormat,
        /// Gzip-compress the output (JSON and CSV only).
        #[arg(long)]
        gzip: bool,
    },

    /// Stream-insert rows from a JSON array literal or a file containing one.
    Insert {
        dataset: String,
        table: String,
        json_or_file: String,
    },
}
