use anyhow::{anyhow, Result};
use arrow::{
    array::UInt32Array,
    compute::take,
    datatypes::{Field, Schema},
    record_batch::{RecordBatch, RecordBatchOptions},
};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crate::table::display_values;

/// Left join `left` and `right` on the column `on`, with pandas `merge` semantics:
/// left order is kept, a left row repeats for every matching right row, unmatched
/// rows get nulls, and non-key columns present on both sides get `_x` / `_y`.
/// Null keys never match.
pub fn left_join(left: &RecordBatch, right: &RecordBatch, on: &str) -> Result<RecordBatch> {
    let left_key = left
        .schema()
        .index_of(on)
        .map_err(|_| anyhow!("join key `{}` missing from left table", on))?;
    let right_key = right
        .schema()
        .index_of(on)
        .map_err(|_| anyhow!("join key `{}` missing from right table", on))?;

    let mut index: HashMap<String, Vec<u32>> = HashMap::new();
    for (row, key) in display_values(right.column(right_key))?
        .into_iter()
        .enumerate()
    {
        if let Some(k) = key {
            index.entry(k).or_default().push(row as u32);
        }
    }

    let mut left_rows: Vec<u32> = Vec::with_capacity(left.num_rows());
    let mut right_rows: Vec<Option<u32>> = Vec::with_capacity(left.num_rows());
    for (row, key) in display_values(left.column(left_key))?
        .into_iter()
        .enumerate()
    {
        match key.as_ref().and_then(|k| index.get(k)) {
            Some(matches) => {
                for &m in matches {
                    left_rows.push(row as u32);
                    right_rows.push(Some(m));
                }
            }
            None => {
                left_rows.push(row as u32);
                right_rows.push(None);
            }
        }
    }
    let left_idx = UInt32Array::from(left_rows);
    let right_idx = UInt32Array::from(right_rows);

    let left_schema = left.schema();
    let right_schema = right.schema();
    let left_names: HashSet<&str> = left_schema
        .fields()
        .iter()
        .map(|f| f.name().as_str())
        .filter(|n| *n != on)
        .collect();
    let right_names: HashSet<&str> = right_schema
        .fields()
        .iter()
        .map(|f| f.name().as_str())
        .filter(|n| *n != on)
        .collect();

    let mut fields: Vec<Field> = Vec::with_capacity(left.num_columns() + right.num_columns());
    let mut columns = Vec::with_capacity(fields.capacity());

    for (f, col) in left_schema.fields().iter().zip(left.columns()) {
        let name = if f.name() != on && right_names.contains(f.name().as_str()) {
            format!("{}_x", f.name())
        } else {
            f.name().clone()
        };
        fields.push(f.as_ref().clone().with_name(name));
        columns.push(take(col.as_ref(), &left_idx, None)?);
    }
    for (i, (f, col)) in right_schema.fields().iter().zip(right.columns()).enumerate() {
        if i == right_key {
            continue;
        }
        let name = if left_names.contains(f.name().as_str()) {
            format!("{}_y", f.name())
        } else {
            f.name().clone()
        };
        fields.push(f.as_ref().clone().with_name(name).with_nullable(true));
        columns.push(take(col.as_ref(), &right_idx, None)?);
    }

    let options = RecordBatchOptions::new().with_row_count(Some(left_idx.len()));
    RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), columns, &options)
        .map_err(Into::into)
}
