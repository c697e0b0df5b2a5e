use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("No accident data found at {0}: supply a file path or pipe a CSV upload with --stdin")]
    SourceNotFound(PathBuf),

    #[error("Unsupported file format for: {0}")]
    UnsupportedFormat(String),

    #[error("Input does not match the configured schema, missing columns: {}", .missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    #[error("Row {row}: timestamp '{value}' does not match pattern '{pattern}'")]
    MalformedTimestamp {
        row: usize,
        value: String,
        pattern: String,
    },

    #[error("Invalid JSON settings file {path}")]
    InvalidSchemaFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("Data processing error (Polars)")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("Failed to serialize data to JSON")]
    JsonSerialization(#[from] serde_json::Error),
}

/// Conditions the pipeline recovers from by dropping or defaulting data.
///
/// These never abort a run; they travel with the results so the caller can
/// show the user how the analysed population changed.
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataWarning {
    #[error("{dropped} rows dropped for missing required fields")]
    MissingRequiredField { dropped: usize },

    #[error("{dropped} rows dropped for invalid numeric or flag values")]
    InvalidNumber { dropped: usize },

    #[error("{dropped} rows dropped for malformed timestamps")]
    MalformedTimestamp { dropped: usize },

    #[error("{dropped} rows excluded for OTHER/UNKNOWN weather or lighting")]
    ExcludedCategory { dropped: usize },

    #[error("No values selected for {dimension}, no data to show")]
    EmptyFilterSelection { dimension: String },
}
