// src/table/time.rs
use anyhow::{Context, Result};
use arrow::{
    array::{Array, ArrayRef, AsArray, Int64Array, Int64Builder},
    compute::cast,
    datatypes::{DataType, Int64Type},
    record_batch::RecordBatch,
};
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use std::sync::Arc;
use tracing::info;

use crate::{error::TableError, table::utils::set_column};

/// Zero point of the day/week/month indices.
pub static EPOCH: Lazy<NaiveDate> =
    Lazy::new(|| NaiveDate::from_ymd_opt(1970, 1, 1).expect("1970-01-01 is a valid date"));

pub const YEAR_COLUMN: &str = "m_year";
pub const MONTH_COLUMN: &str = "m_month";
pub const DAY_COLUMN: &str = "m_day";

/// Build a date from a raw triple, failing on anything outside the calendar.
pub fn calendar_date(
    row: usize,
    year: i64,
    month: i64,
    day: i64,
) -> Result<NaiveDate, TableError> {
    let invalid = || TableError::InvalidDate {
        row,
        year,
        month,
        day,
    };
    let y = i32::try_from(year).map_err(|_| invalid())?;
    let m = u32::try_from(month).map_err(|_| invalid())?;
    let d = u32::try_from(day).map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(y, m, d).ok_or_else(invalid)
}

/// Days since 1970-01-01, negative before it.
pub fn day_index(date: NaiveDate) -> i64 {
    date.signed_duration_since(*EPOCH).num_days()
}

/// Weeks since 1970-01-01, floored (day -1 is week -1).
pub fn week_index(date: NaiveDate) -> i64 {
    day_index(date).div_euclid(7)
}

/// 1-based month count where 1970-01 is month 1.
pub fn month_index(year: i64, month: i64) -> i64 {
    let month0 = i64::from(EPOCH.year()) * 12 + i64::from(EPOCH.month());
    year * 12 + month - month0 + 1
}

/// 1-based day within the date's own year.
pub fn day_of_year(date: NaiveDate) -> i64 {
    // date.year() always has a January 1st
    let jan1 = date.with_ordinal(1).unwrap_or(date);
    date.signed_duration_since(jan1).num_days() + 1
}

/// 1-based block of seven days counted from January 1st; day 366 is week 53.
pub fn week_of_year(day_of_year: i64) -> i64 {
    (day_of_year - 1).div_euclid(7) + 1
}

fn int_column(batch: &RecordBatch, name: &str) -> Result<(ArrayRef, Int64Array)> {
    let original = batch
        .column_by_name(name)
        .cloned()
        .ok_or_else(|| TableError::MissingColumn {
            column: name.to_string(),
        })?;
    let as_int = cast(&original, &DataType::Int64)
        .with_context(|| format!("casting `{}` to integers", name))?;
    let as_int = as_int.as_primitive::<Int64Type>().clone();
    Ok((original, as_int))
}

fn value_at(column: &Int64Array, name: &str, row: usize) -> Result<i64, TableError> {
    if column.is_null(row) {
        return Err(TableError::MissingValue {
            column: name.to_string(),
            row,
        });
    }
    Ok(column.value(row))
}

/// Append `t_year`, `t_day`, `t_week`, `t_month`, `ty_day`, `ty_week` and
/// `ty_month` computed from `m_year`/`m_month`/`m_day`.
///
/// Fails on the first row without a valid calendar date.
pub fn derive_time_columns(batch: &RecordBatch) -> Result<RecordBatch> {
    let (years_raw, years) = int_column(batch, YEAR_COLUMN)?;
    let (months_raw, months) = int_column(batch, MONTH_COLUMN)?;
    let (_, days) = int_column(batch, DAY_COLUMN)?;

    let rows = batch.num_rows();
    let mut t_day = Int64Builder::with_capacity(rows);
    let mut t_week = Int64Builder::with_capacity(rows);
    let mut t_month = Int64Builder::with_capacity(rows);
    let mut ty_day = Int64Builder::with_capacity(rows);
    let mut ty_week = Int64Builder::with_capacity(rows);

    for row in 0..rows {
        let year = value_at(&years, YEAR_COLUMN, row)?;
        let month = value_at(&months, MONTH_COLUMN, row)?;
        let day = value_at(&days, DAY_COLUMN, row)?;
        let date = calendar_date(row, year, month, day)?;

        let doy = day_of_year(date);
        t_day.append_value(day_index(date));
        t_week.append_value(week_index(date));
        t_month.append_value(month_index(year, month));
        ty_day.append_value(doy);
        ty_week.append_value(week_of_year(doy));
    }

    let derived: [(&str, ArrayRef); 7] = [
        ("t_year", years_raw),
        ("t_day", Arc::new(t_day.finish())),
        ("t_week", Arc::new(t_week.finish())),
        ("t_month", Arc::new(t_month.finish())),
        ("ty_day", Arc::new(ty_day.finish())),
        ("ty_week", Arc::new(ty_week.finish())),
        ("ty_month", months_raw),
    ];

    let mut out = batch.clone();
    for (name, column) in derived {
        out = set_column(&out, name, column)?;
    }

    info!(rows, "derived time columns");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::utils::rebuild_batch;
    use arrow::{
        array::{Float64Array, StringArray},
        datatypes::Field,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ymd_batch(year: ArrayRef, month: ArrayRef, day: ArrayRef) -> Result<RecordBatch> {
        let rows = year.len();
        rebuild_batch(
            vec![
                Arc::new(Field::new(YEAR_COLUMN, year.data_type().clone(), true)),
                Arc::new(Field::new(MONTH_COLUMN, month.data_type().clone(), true)),
                Arc::new(Field::new(DAY_COLUMN, day.data_type().clone(), true)),
            ],
            vec![year, month, day],
            rows,
        )
    }

    fn ints(values: Vec<i64>) -> ArrayRef {
        Arc::new(Int64Array::from(values))
    }

    fn column(batch: &RecordBatch, name: &str) -> Vec<i64> {
        batch
            .column_by_name(name)
            .unwrap()
            .as_primitive::<Int64Type>()
            .values()
            .to_vec()
    }

    #[test]
    fn day_and_week_index_around_the_epoch() {
        assert_eq!(day_index(date(1970, 1, 1)), 0);
        assert_eq!(week_index(date(1970, 1, 1)), 0);
        assert_eq!(day_index(date(1970, 1, 8)), 7);
        assert_eq!(week_index(date(1970, 1, 8)), 1);
        assert_eq!(day_index(date(1969, 12, 31)), -1);
        assert_eq!(week_index(date(1969, 12, 31)), -1);
        assert_eq!(week_index(date(1969, 12, 25)), -1);
        assert_eq!(week_index(date(1969, 12, 24)), -2);
    }

    #[test]
    fn month_index_is_one_based_from_1970() {
        assert_eq!(month_index(1970, 1), 1);
        assert_eq!(month_index(1970, 2), 2);
        assert_eq!(month_index(1971, 1), 13);
        assert_eq!(month_index(1969, 12), 0);

        let mut last = i64::MIN;
        for year in 1965..1975 {
            for month in 1..=12 {
                let idx = month_index(year, month);
                assert!(idx > last);
                last = idx;
            }
        }
    }

    #[test]
    fn day_of_year_handles_leap_years() {
        assert_eq!(day_of_year(date(2021, 1, 1)), 1);
        assert_eq!(day_of_year(date(2021, 12, 31)), 365);
        assert_eq!(day_of_year(date(2020, 12, 31)), 366);
        assert_eq!(day_of_year(date(2020, 3, 1)), 61);
        assert_eq!(day_of_year(date(1900, 3, 1)), 60);
    }

    #[test]
    fn week_of_year_blocks_of_seven() {
        assert_eq!(week_of_year(1), 1);
        assert_eq!(week_of_year(7), 1);
        assert_eq!(week_of_year(8), 2);
        assert_eq!(week_of_year(365), 53);
        assert_eq!(week_of_year(366), 53);
    }

    #[test]
    fn derives_all_seven_columns() -> Result<()> {
        let batch = ymd_batch(
            ints(vec![1970, 1969, 2020]),
            ints(vec![1, 12, 12]),
            ints(vec![8, 31, 31]),
        )?;

        let out = derive_time_columns(&batch)?;
        let names: Vec<String> = out
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(
            names,
            vec![
                "m_year", "m_month", "m_day", "t_year", "t_day", "t_week", "t_month", "ty_day",
                "ty_week", "ty_month"
            ]
        );

        assert_eq!(column(&out, "t_year"), vec![1970, 1969, 2020]);
        assert_eq!(column(&out, "t_day"), vec![7, -1, 18627]);
        assert_eq!(column(&out, "t_week"), vec![1, -1, 2661]);
        assert_eq!(column(&out, "t_month"), vec![1, 0, 612]);
        assert_eq!(column(&out, "ty_day"), vec![8, 365, 366]);
        assert_eq!(column(&out, "ty_week"), vec![2, 53, 53]);
        assert_eq!(column(&out, "ty_month"), vec![1, 12, 12]);
        Ok(())
    }

    #[test]
    fn copies_keep_the_source_type() -> Result<()> {
        let batch = ymd_batch(
            Arc::new(Float64Array::from(vec![2001.0])),
            Arc::new(StringArray::from(vec!["2"])),
            ints(vec![3]),
        )?;

        let out = derive_time_columns(&batch)?;
        let schema = out.schema();
        assert_eq!(
            schema.field_with_name("t_year")?.data_type(),
            &DataType::Float64
        );
        assert_eq!(
            schema.field_with_name("ty_month")?.data_type(),
            &DataType::Utf8
        );
        assert_eq!(column(&out, "ty_day"), vec![31 + 3]);
        Ok(())
    }

    #[test]
    fn existing_derived_column_is_overwritten() -> Result<()> {
        let batch = ymd_batch(ints(vec![1970]), ints(vec![1]), ints(vec![2]))?;
        let batch = set_column(&batch, "t_day", ints(vec![999]))?;

        let out = derive_time_columns(&batch)?;
        assert_eq!(out.num_columns(), 10);
        assert_eq!(out.schema().field(3).name(), "t_day");
        assert_eq!(column(&out, "t_day"), vec![1]);
        Ok(())
    }

    #[test]
    fn invalid_date_fails_with_its_row() -> Result<()> {
        let batch = ymd_batch(
            ints(vec![2020, 2021]),
            ints(vec![2, 2]),
            ints(vec![29, 29]),
        )?;

        let err = derive_time_columns(&batch).unwrap_err();
        match err.downcast_ref::<TableError>() {
            Some(TableError::InvalidDate {
                row, year, day, ..
            }) => {
                assert_eq!((*row, *year, *day), (1, 2021, 29));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn month_thirteen_is_invalid() {
        assert!(matches!(
            calendar_date(0, 2000, 13, 1),
            Err(TableError::InvalidDate { .. })
        ));
        assert!(matches!(
            calendar_date(0, 2000, -1, 1),
            Err(TableError::InvalidDate { .. })
        ));
    }

    #[test]
    fn missing_source_column_fails() -> Result<()> {
        let batch = rebuild_batch(
            vec![Arc::new(Field::new(YEAR_COLUMN, DataType::Int64, true))],
            vec![ints(vec![2000])],
            1,
        )?;
        let err = derive_time_columns(&batch).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TableError>(),
            Some(TableError::MissingColumn { column }) if column == MONTH_COLUMN
        ));
        Ok(())
    }

    #[test]
    fn null_day_fails() -> Result<()> {
        let batch = ymd_batch(
            ints(vec![2000]),
            ints(vec![1]),
            Arc::new(Int64Array::from(vec![None])),
        )?;
        let err = derive_time_columns(&batch).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TableError>(),
            Some(TableError::MissingValue { row: 0, .. })
        ));
        Ok(())
    }
}
