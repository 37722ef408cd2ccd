// crates/types/src/format.rs
//! File formats accepted by load and extract jobs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Serialization format of a load source or extract destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SourceFormat {
    /// Newline-delimited JSON.
    #[default]
    Json,
    Csv,
    Avro,
}

impl SourceFormat {
    /// The name the warehouse API expects in job configurations.
    pub fn wire_name(&self) -> &'static str {
        match self {
            SourceFormat::Json => "NEWLINE_DELIMITED_JSON",
            SourceFormat::Csv => "CSV",
            SourceFormat::Avro => "AVRO",
        }
    }

    /// Whether gzip compression makes sense for this format on export.
    /// Avro carries its own codec, so the flag is rejected there.
    pub fn supports_gzip(&self) -> bool {
        !matches!(self, SourceFormat::Avro)
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceFormat::Json => "JSON",
            SourceFormat::Csv => "CSV",
            SourceFormat::Avro => "AVRO",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown format '{0}' (expected JSON, CSV, or AVRO)")]
pub struct FormatParseError(pub String);

impl FromStr for SourceFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "JSON" | "NEWLINE_DELIMITED_JSON" => Ok(SourceFormat::Json),
            "CSV" => Ok(SourceFormat::Csv),
            "AVRO" => Ok(SourceFormat::Avro),
            _ => Err(FormatParseError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("json".parse::<SourceFormat>().unwrap(), SourceFormat::Json);
        assert_eq!("CSV".parse::<SourceFormat>().unwrap(), SourceFormat::Csv);
        assert_eq!("Avro".parse::<SourceFormat>().unwrap(), SourceFormat::Avro);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = "parquet".parse::<SourceFormat>().unwrap_err();
        assert!(err.to_string().contains("parquet"));
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(SourceFormat::Json.wire_name(), "NEWLINE_DELIMITED_JSON");
        assert_eq!(SourceFormat::Csv.wire_name(), "CSV");
        assert_eq!(SourceFormat::Avro.wire_name(), "AVRO");
    }

    #[test]
    fn test_gzip_support() {
        assert!(SourceFormat::Json.supports_gzip());
        assert!(SourceFormat::Csv.supports_gzip());
        assert!(!SourceFormat::Avro.supports_gzip());
    }
}
