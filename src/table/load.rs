// src/table/load.rs
use anyhow::{Context, Result};
use arrow::{
    compute::concat_batches,
    csv::{reader::Format, ReaderBuilder},
    datatypes::{Field, FieldRef, Schema},
    error::ArrowError,
    record_batch::RecordBatch,
};
use std::{
    fs,
    io::{Cursor, ErrorKind},
    path::Path,
    sync::Arc,
};
use tracing::{debug, info, warn};

use crate::{
    config::ImportOptions,
    error::TableError,
    table::utils::{
        clean_headers, missing_value_regex, narrow_inferred_type, rebuild_batch, to_csv_text,
    },
};

/// Index column accidentally written by upstream tools.
pub const UNNAMED_INDEX_COLUMN: &str = "Unnamed: 0";

/// Read one delimited file fully into a single batch.
///
/// Types are inferred per column, then narrowed (see `narrow_inferred_type`).
/// Missing-value markers such as `NA` or `-nan` read as nulls and do not
/// affect inference. With `options.infer_records` set, a later row that does
/// not fit the sampled type fails with `TableError::Parse`.
/// Empty header cells and repeated header names are renamed before any column
/// reaches the batch.
#[tracing::instrument(level = "info", skip(path, options), fields(path = %path.display()))]
pub fn read_table(path: &Path, options: &ImportOptions) -> Result<RecordBatch> {
    let raw = fs::read_to_string(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => TableError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => TableError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let text = to_csv_text(&raw, options.delimiter);
    if text.is_empty() {
        return Err(TableError::EmptyFile {
            path: path.to_path_buf(),
        }
        .into());
    }

    let parse_err = |source: ArrowError| TableError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let format = Format::default()
        .with_header(true)
        .with_delimiter(b',')
        .with_quote(b'"')
        .with_null_regex(missing_value_regex());

    let (inferred, sampled) = format
        .infer_schema(Cursor::new(text.as_bytes()), options.infer_records)
        .map_err(parse_err)?;
    debug!(columns = inferred.fields().len(), sampled, "inferred schema");

    let raw_names: Vec<&str> = inferred.fields().iter().map(|f| f.name().as_str()).collect();
    let names = clean_headers(&raw_names);
    let fields: Vec<Field> = names
        .iter()
        .zip(inferred.fields())
        .map(|(name, f)| Field::new(name, narrow_inferred_type(f.data_type()), true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let reader = ReaderBuilder::new(schema.clone())
        .with_format(format)
        .with_batch_size(options.batch_size.max(1))
        .build(Cursor::new(text.as_bytes()))
        .map_err(parse_err)?;
    let batches = reader
        .collect::<Result<Vec<RecordBatch>, ArrowError>>()
        .map_err(parse_err)?;
    let batch = concat_batches(&schema, &batches).map_err(parse_err)?;

    info!(
        rows = batch.num_rows(),
        columns = batch.num_columns(),
        "loaded table"
    );
    Ok(batch)
}

/// Append every column of `other` whose name is not yet in `base`.
///
/// Columns already in `base` win; rows are matched by position, so each
/// appended column must have exactly `base.num_rows()` values.
pub fn merge_new_columns(
    base: &RecordBatch,
    other: &RecordBatch,
    other_path: &Path,
) -> Result<RecordBatch> {
    let base_schema = base.schema();
    let mut fields: Vec<FieldRef> = base_schema.fields().iter().cloned().collect();
    let mut columns = base.columns().to_vec();

    for (field, column) in other.schema().fields().iter().zip(other.columns()) {
        if fields.iter().any(|f| f.name() == field.name()) {
            continue;
        }
        if column.len() != base.num_rows() {
            return Err(TableError::RowCountMismatch {
                column: field.name().clone(),
                path: other_path.to_path_buf(),
                expected: base.num_rows(),
                actual: column.len(),
            }
            .into());
        }
        debug!(column = %field.name(), from = %other_path.display(), "adding column");
        fields.push(field.clone());
        columns.push(column.clone());
    }

    rebuild_batch(fields, columns, base.num_rows())
}

/// Load every file in order and fold them into one table, then drop the
/// `Unnamed: 0` artefact column if one survived the merge.
#[tracing::instrument(level = "info", skip_all, fields(files = paths.len()))]
pub fn load_tables<P: AsRef<Path>>(paths: &[P], options: &ImportOptions) -> Result<RecordBatch> {
    let (first, rest) = paths.split_first().ok_or(TableError::NoInputFiles)?;

    let first = first.as_ref();
    let mut table =
        read_table(first, options).with_context(|| format!("loading {}", first.display()))?;

    for path in rest {
        let path = path.as_ref();
        let next =
            read_table(path, options).with_context(|| format!("loading {}", path.display()))?;
        table = merge_new_columns(&table, &next, path)
            .with_context(|| format!("merging {}", path.display()))?;
    }

    if let Ok(idx) = table.schema().index_of(UNNAMED_INDEX_COLUMN) {
        warn!("dropping `{}` column", UNNAMED_INDEX_COLUMN);
        table.remove_column(idx);
    }

    info!(
        rows = table.num_rows(),
        columns = table.num_columns(),
        "merged tables"
    );
    Ok(table)
}
