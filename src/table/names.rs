use anyhow::Result;
use arrow::{
    datatypes::{Field, FieldRef},
    record_batch::RecordBatch,
};
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

use crate::table::utils::rebuild_batch;

/// Prefix given to every loaded column.
pub const COLUMN_PREFIX: &str = "m_";

/// `.` → `_`, `%` → `percentage_`, then the `m_` prefix.
pub fn sanitize_column_name(name: &str) -> String {
    format!(
        "{}{}",
        COLUMN_PREFIX,
        name.replace('.', "_").replace('%', "percentage_")
    )
}

/// Sanitize every name and disambiguate repeats of the same sanitized name.
///
/// The k-th occurrence (k >= 2) of a sanitized name gets `_k` appended. Only
/// repeats of one sanitized name are counted: `["x", "x", "x_2"]` still yields
/// `m_x_2` twice.
pub fn normalize_column_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();

    names
        .iter()
        .map(|name| {
            let sanitized = sanitize_column_name(name.as_ref());
            let count = seen.entry(sanitized.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                sanitized
            } else {
                format!("{}_{}", sanitized, count)
            }
        })
        .collect()
}

/// Rename every column of `batch` with `normalize_column_names`.
pub fn normalize_columns(batch: &RecordBatch) -> Result<RecordBatch> {
    let schema = batch.schema();
    let original: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    let renamed = normalize_column_names(&original);

    let fields: Vec<FieldRef> = schema
        .fields()
        .iter()
        .zip(&renamed)
        .map(|(field, name)| {
            if field.name() != name {
                debug!(from = %field.name(), to = %name, "renaming column");
            }
            Arc::new(Field::clone(field).with_name(name.as_str()))
        })
        .collect();

    rebuild_batch(fields, batch.columns().to_vec(), batch.num_rows())
}
