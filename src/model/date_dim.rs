use anyhow::{bail, Result};
use arrow::{
    array::{ArrayRef, Date32Array, Int32Array},
    record_batch::RecordBatch,
};
use chrono::{Datelike, NaiveDate};
use std::sync::Arc;

use crate::table::{date_to_days, date_values};

/// One row per calendar day from the earliest to the latest date in `dates`, inclusive.
///
/// Columns: `Date`, `Year`, `Month`, `Day`, `Quarter`, `DayOfWeek` (Monday = 0).
pub fn build_dim_date(dates: &dyn arrow::array::Array) -> Result<RecordBatch> {
    let values: Vec<NaiveDate> = date_values(dates)?.into_iter().flatten().collect();
    let (Some(min), Some(max)) = (values.iter().min(), values.iter().max()) else {
        bail!("cannot build dim_date: no order dates present");
    };
    let days: Vec<NaiveDate> = min.iter_days().take_while(|d| d <= max).collect();

    let column = |f: fn(&NaiveDate) -> i32| -> ArrayRef {
        Arc::new(Int32Array::from(days.iter().map(f).collect::<Vec<_>>()))
    };

    RecordBatch::try_from_iter(vec![
        (
            "Date",
            Arc::new(Date32Array::from(
                days.iter().map(|d| date_to_days(*d)).collect::<Vec<_>>(),
            )) as ArrayRef,
        ),
        ("Year", column(|d| d.year())),
        ("Month", column(|d| d.month() as i32)),
        ("Day", column(|d| d.day() as i32)),
        ("Quarter", column(|d| ((d.month() - 1) / 3 + 1) as i32)),
        (
            "DayOfWeek",
            column(|d| d.weekday().num_days_from_monday() as i32),
        ),
    ])
    .map_err(Into::into)
}
