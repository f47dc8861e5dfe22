use arrow::error::ArrowError;
use std::path::PathBuf;
use thiserror::Error;

/// Every way building a table can fail.
///
/// Library functions return `anyhow::Result`; the root cause is always one of
/// these, so callers can recover it with `err.downcast_ref::<TableError>()`.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("no input files given")]
    NoInputFiles,

    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} has no header line", path.display())]
    EmptyFile { path: PathBuf },

    #[error("malformed delimited content in {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ArrowError,
    },

    #[error(
        "column `{column}` from {} has {actual} rows, expected {expected}",
        path.display()
    )]
    RowCountMismatch {
        column: String,
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error("required column `{column}` is missing")]
    MissingColumn { column: String },

    #[error("column `{column}` has no integer value at row {row}")]
    MissingValue { column: String, row: usize },

    #[error("invalid calendar date {year}-{month}-{day} at row {row}")]
    InvalidDate {
        row: usize,
        year: i64,
        month: i64,
        day: i64,
    },

    #[error("invalid config {}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
