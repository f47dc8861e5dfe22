// src/table/mod.rs
use anyhow::{Context, Result};
use arrow::record_batch::RecordBatch;
use std::path::Path;
use tracing::info;

use crate::config::{Delimiter, ImportOptions};

pub mod load;
pub mod names;
pub mod time;
pub mod utils;

pub use load::{load_tables, merge_new_columns, read_table, UNNAMED_INDEX_COLUMN};
pub use names::{normalize_column_names, normalize_columns, sanitize_column_name};
pub use time::{
    day_index, day_of_year, derive_time_columns, month_index, week_index, week_of_year, EPOCH,
};

/// Loads simulation output files into one analytics-ready table:
/// merge the files, normalize the column names, then add the calendar
/// index columns.
#[derive(Debug, Clone, Default)]
pub struct TableBuilder {
    options: ImportOptions,
}

impl TableBuilder {
    pub fn new(options: ImportOptions) -> Self {
        Self { options }
    }

    #[tracing::instrument(
        level = "info",
        skip_all,
        fields(files = paths.len(), delimiter = ?self.options.delimiter)
    )]
    pub fn build<P: AsRef<Path>>(&self, paths: &[P]) -> Result<RecordBatch> {
        let merged = load_tables(paths, &self.options)?;
        let renamed = normalize_columns(&merged).context("normalizing column names")?;
        let table = derive_time_columns(&renamed).context("deriving time columns")?;

        info!(
            rows = table.num_rows(),
            columns = table.num_columns(),
            "table ready"
        );
        Ok(table)
    }
}

/// `TableBuilder` with default options and the given delimiter flag.
pub fn prepare_table<P: AsRef<Path>>(paths: &[P], delim_whitespace: bool) -> Result<RecordBatch> {
    let options =
        ImportOptions::default().with_delimiter(Delimiter::from_whitespace_flag(delim_whitespace));
    TableBuilder::new(options).build(paths)
}
