// src/table.rs
//! Small Arrow helpers shared by the modelling stage and the reporting layer.

use anyhow::{anyhow, Context, Result};
use arrow::{
    array::{Array, ArrayRef, BooleanArray, Date32Array, Float64Array, StringArray},
    compute::{cast, concat_batches, filter_record_batch},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
    util::display::{ArrayFormatter, FormatOptions},
};
use chrono::{Duration, NaiveDate};
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    basic::Compression,
    file::properties::WriterProperties,
};
use std::{fs, fs::File, path::Path, sync::Arc};

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Days since 1970-01-01, the Arrow `Date32` representation.
pub fn date_to_days(date: NaiveDate) -> i32 {
    (date - epoch()).num_days() as i32
}

pub fn days_to_date(days: i32) -> NaiveDate {
    epoch() + Duration::days(days as i64)
}

/// Read every row group of a Parquet file into one batch.
pub fn read_parquet(path: &Path) -> Result<RecordBatch> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .with_context(|| format!("reading parquet metadata of {}", path.display()))?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;
    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("decoding {}", path.display()))?;
    concat_batches(&schema, &batches).map_err(Into::into)
}

/// Write `batch` to `path` via a temporary file that is renamed into place.
pub fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let file = File::create(&temp_path)
        .with_context(|| format!("creating {}", temp_path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("creating Arrow writer")?;
    writer.write(batch).context("writing record batch")?;
    writer.close().context("closing Arrow writer")?;

    fs::rename(&temp_path, path)
        .with_context(|| format!("renaming {} -> {}", temp_path.display(), path.display()))?;
    Ok(())
}

pub fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| anyhow!("column `{}` not found", name))
}

/// Keep only `names`, in that order.
pub fn select_columns(batch: &RecordBatch, names: &[&str]) -> Result<RecordBatch> {
    let indices = names
        .iter()
        .map(|n| {
            batch
                .schema()
                .index_of(n)
                .map_err(|_| anyhow!("column `{}` not found", n))
        })
        .collect::<Result<Vec<_>>>()?;
    batch.project(&indices).map_err(Into::into)
}

/// Rename columns; names not present in the batch are ignored.
pub fn rename_columns(batch: &RecordBatch, renames: &[(&str, &str)]) -> Result<RecordBatch> {
    let schema = batch.schema();
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|f| {
            let name = renames
                .iter()
                .find(|(from, _)| *from == f.name().as_str())
                .map(|(_, to)| *to)
                .unwrap_or(f.name().as_str());
            f.as_ref().clone().with_name(name)
        })
        .collect();
    let schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
    RecordBatch::try_new(schema, batch.columns().to_vec()).map_err(Into::into)
}

/// Rows whose `name` column renders exactly as `value`.
pub fn filter_eq(batch: &RecordBatch, name: &str, value: &str) -> Result<RecordBatch> {
    let keys = display_values(column(batch, name)?)?;
    let mask: BooleanArray = keys
        .iter()
        .map(|k| Some(k.as_deref() == Some(value)))
        .collect();
    filter_record_batch(batch, &mask).map_err(Into::into)
}

/// Each cell rendered as text; nulls stay `None`.
pub fn display_values(array: &dyn Array) -> Result<Vec<Option<String>>> {
    if let Some(s) = array.as_any().downcast_ref::<StringArray>() {
        return Ok(s.iter().map(|v| v.map(str::to_string)).collect());
    }
    let formatter = ArrayFormatter::try_new(array, &FormatOptions::default())?;
    Ok((0..array.len())
        .map(|i| {
            if array.is_null(i) {
                None
            } else {
                Some(formatter.value(i).to_string())
            }
        })
        .collect())
}

/// Numeric cells as `f64`; anything that will not cast is an error.
pub fn f64_values(array: &dyn Array) -> Result<Vec<Option<f64>>> {
    let casted = cast(array, &DataType::Float64)
        .with_context(|| format!("casting {:?} to Float64", array.data_type()))?;
    let floats = casted
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| anyhow!("expected Float64 after cast"))?;
    Ok(floats.iter().collect())
}

/// Date cells; accepts Date32 or anything Arrow can cast to it.
pub fn date_values(array: &dyn Array) -> Result<Vec<Option<NaiveDate>>> {
    let casted = cast(array, &DataType::Date32)
        .with_context(|| format!("casting {:?} to Date32", array.data_type()))?;
    let dates = casted
        .as_any()
        .downcast_ref::<Date32Array>()
        .ok_or_else(|| anyhow!("expected Date32 after cast"))?;
    Ok(dates.iter().map(|d| d.map(days_to_date)).collect())
}
