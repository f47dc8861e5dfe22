use anyhow::Result;
use arrow::{
    array::ArrayRef,
    datatypes::{DataType, Field, FieldRef, Schema},
    record_batch::{RecordBatch, RecordBatchOptions},
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{collections::HashMap, sync::Arc};

use crate::config::Delimiter;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("valid regex"));

/// Cells read as null: empty, plus the usual dataframe missing-value markers
/// (`NA`, `NULL`, `#N/A`, C's `-nan`, ...).
static MISSING_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:|#N/A|#N/A N/A|#NA|-1\.#IND|-1\.#QNAN|-NaN|-nan|1\.#IND|1\.#QNAN|<NA>|N/A|NA|NULL|NaN|None|n/a|nan|null)$",
    )
    .expect("valid regex")
});

pub fn missing_value_regex() -> Regex {
    MISSING_VALUE.clone()
}

/// Prepare raw file text for the Arrow CSV reader.
///
/// Blank lines are dropped, except inside a quoted comma-mode field where they
/// belong to the value. Whitespace-delimited lines have every run of
/// spaces/tabs rewritten to one comma; a field that itself holds a comma is
/// quoted so it stays one column.
pub fn to_csv_text(raw: &str, delimiter: Delimiter) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_quotes = false;

    for chunk in raw.split_inclusive('\n') {
        if !in_quotes && chunk.trim().is_empty() {
            continue;
        }
        match delimiter {
            Delimiter::Comma => {
                out.push_str(chunk);
                if chunk.matches('"').count() % 2 == 1 {
                    in_quotes = !in_quotes;
                }
            }
            Delimiter::Whitespace => {
                let fields: Vec<String> = WHITESPACE_RUN
                    .split(chunk.trim())
                    .map(quote_field)
                    .collect();
                out.push_str(&fields.join(","));
                out.push('\n');
            }
        }
    }

    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn quote_field(field: &str) -> String {
    if field.contains(',') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Give empty header cells a positional `Unnamed: i` name and mangle repeats
/// to `name.1`, `name.2`, ... until the name is unused.
pub fn clean_headers<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(raw.len());

    for (i, name) in raw.iter().enumerate() {
        let mut col = match name.as_ref() {
            "" => format!("Unnamed: {}", i),
            named => named.to_string(),
        };

        let mut seen = counts.get(&col).copied().unwrap_or(0);
        while seen > 0 {
            counts.insert(col.clone(), seen + 1);
            col = format!("{}.{}", col, seen);
            seen = counts.get(&col).copied().unwrap_or(0);
        }
        counts.insert(col.clone(), seen + 1);
        out.push(col);
    }

    out
}

/// Narrow an inferred Arrow type to what a dataframe reader would produce:
/// integers, floats and booleans stay, an all-empty column is a float column,
/// everything else is text.
pub fn narrow_inferred_type(inferred: &DataType) -> DataType {
    match inferred {
        DataType::Int64 | DataType::Float64 | DataType::Boolean => inferred.clone(),
        DataType::Null => DataType::Float64,
        _ => DataType::Utf8,
    }
}

/// Rebuild a batch from parallel field/column lists, keeping `num_rows` even
/// when the list of columns is empty.
pub fn rebuild_batch(
    fields: Vec<FieldRef>,
    columns: Vec<ArrayRef>,
    num_rows: usize,
) -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(fields));
    let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
    RecordBatch::try_new_with_options(schema, columns, &options).map_err(Into::into)
}

/// Assign `array` to column `name`: replace it in place when the name exists,
/// otherwise append it on the right.
pub fn set_column(batch: &RecordBatch, name: &str, array: ArrayRef) -> Result<RecordBatch> {
    let mut fields: Vec<FieldRef> = batch.schema().fields().iter().cloned().collect();
    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
    let field = Arc::new(Field::new(name, array.data_type().clone(), true));

    match fields.iter().position(|f| f.name() == name) {
        Some(idx) => {
            fields[idx] = field;
            columns[idx] = array;
        }
        None => {
            fields.push(field);
            columns.push(array);
        }
    }

    rebuild_batch(fields, columns, batch.num_rows())
}
