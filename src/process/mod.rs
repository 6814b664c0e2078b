// src/process/mod.rs
pub mod convert;
pub mod date_parser;
pub mod raw_table;
pub mod utils;

use anyhow::{bail, Context, Result};
use arrow::{
    datatypes::Schema as ArrowSchema,
    record_batch::{RecordBatch, RecordBatchOptions},
};
use glob::glob;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{error, info, instrument};

use crate::config::TransformationConfig;
use crate::report::{Event, Reporter, SkipReason};
use crate::schema::{build_arrow_schema, Schema, TableSchema};
use crate::table::write_parquet;
use convert::{coerce_column, fill_nulls};
pub use raw_table::RawTable;

#[derive(Debug, Clone, PartialEq)]
pub struct TableOutcome {
    pub table: String,
    pub rows_in: usize,
    pub rows_out: usize,
    pub duplicates_dropped: usize,
    /// (column, cells kept as text)
    pub uncast: Vec<(String, usize)>,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformSummary {
    pub written: Vec<TableOutcome>,
    pub skipped: Vec<(String, SkipReason)>,
}

/// Clean every raw CSV that has a schema entry and write it as Parquet.
///
/// Files with missing columns or no schema are skipped; any other error
/// aborts the stage.
pub fn validate_and_transform_data(
    cfg: &TransformationConfig,
    schema: &Schema,
    reporter: &dyn Reporter,
) -> Result<TransformSummary> {
    transform_dir(
        &cfg.data_path,
        &cfg.output_path,
        schema,
        cfg.strict_casting,
        reporter,
    )
    .map_err(|e| {
        error!(error = ?e, "an error occurred during data transformation");
        e
    })
}

#[instrument(level = "info", skip(schema, reporter), fields(input = %input_dir.display()))]
pub fn transform_dir(
    input_dir: &Path,
    output_dir: &Path,
    schema: &Schema,
    strict: bool,
    reporter: &dyn Reporter,
) -> Result<TransformSummary> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    let pattern = format!("{}/*.csv", input_dir.display());
    let mut csv_files = glob(&pattern)
        .context("invalid glob pattern for raw CSVs")?
        .collect::<Result<Vec<_>, _>>()
        .context("listing raw CSVs")?;
    csv_files.sort();
    info!("found {} CSV files to transform", csv_files.len());

    let mut summary = TransformSummary::default();
    for path in csv_files {
        let file = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let Some(table) = schema.table(&stem) else {
            reporter.report(Event::FileSkipped {
                file: file.clone(),
                reason: SkipReason::NoSchema,
            });
            summary.skipped.push((file, SkipReason::NoSchema));
            continue;
        };

        info!(file = %file, "processing and validating file");
        let raw = RawTable::read_csv(&path, &stem)?;

        let missing = raw.missing_columns(table);
        if !missing.is_empty() {
            let reason = SkipReason::MissingColumns(missing);
            reporter.report(Event::FileSkipped {
                file: file.clone(),
                reason: reason.clone(),
            });
            summary.skipped.push((file, reason));
            continue;
        }

        let (batch, mut outcome) = transform_table(raw, table, strict, reporter)?;
        let out_path = output_dir.join(format!("{}.parquet", stem));
        write_parquet(&out_path, &batch)
            .with_context(|| format!("writing processed table {}", stem))?;

        reporter.report(Event::TableWritten {
            table: stem,
            rows: batch.num_rows(),
            path: out_path.clone(),
        });
        outcome.path = out_path;
        summary.written.push(outcome);
    }

    Ok(summary)
}

/// Project, de-duplicate, coerce and fill one raw table.
pub fn transform_table(
    raw: RawTable,
    table: &TableSchema,
    strict: bool,
    reporter: &dyn Reporter,
) -> Result<(RecordBatch, TableOutcome)> {
    let rows_in = raw.rows.len();
    let mut projected = raw.project(table)?;

    let mut duplicates_dropped = 0;
    if let Some(key) = &table.primary_key {
        let keys = normalized_keys(&projected, table, key)?;
        duplicates_dropped = projected.drop_duplicates_by(keys)?;
        if duplicates_dropped > 0 {
            reporter.report(Event::DuplicatesDropped {
                table: table.name.clone(),
                key: key.clone(),
                dropped: duplicates_dropped,
            });
        }
    }

    let declared = build_arrow_schema(&table.fields);
    let mut fields = Vec::with_capacity(table.fields.len());
    let mut arrays = Vec::with_capacity(table.fields.len());
    let mut uncast = Vec::new();

    for (idx, field) in table.fields.iter().enumerate() {
        let cells = projected.column(idx);
        let coerced = coerce_column(field, &cells);
        if coerced.uncast > 0 {
            if strict {
                bail!(
                    "table `{}` column `{}`: {} values do not cast to {}",
                    table.name,
                    field.name,
                    coerced.uncast,
                    field.ty
                );
            }
            reporter.report(Event::UncastValues {
                table: table.name.clone(),
                column: field.name.clone(),
                target: field.ty,
                count: coerced.uncast,
            });
            uncast.push((field.name.clone(), coerced.uncast));
        }

        let column = fill_nulls(coerced.column);
        let declared_field = declared.field(idx);
        if declared_field.data_type() == &column.data_type() {
            fields.push(declared_field.clone());
        } else {
            // uncast values, kept as text
            fields.push(declared_field.clone().with_data_type(column.data_type()));
        }
        arrays.push(column.into_array());
    }

    let rows_out = projected.rows.len();
    let options = RecordBatchOptions::new().with_row_count(Some(rows_out));
    let batch =
        RecordBatch::try_new_with_options(Arc::new(ArrowSchema::new(fields)), arrays, &options)
            .with_context(|| format!("building record batch for {}", table.name))?;

    Ok((
        batch,
        TableOutcome {
            table: table.name.clone(),
            rows_in,
            rows_out,
            duplicates_dropped,
            uncast,
            path: PathBuf::new(),
        },
    ))
}

/// Every row's key as it will read once cast and null-filled, so that
/// ` 500`, `500.0` and `500` collide, as do blank and NA-marker keys.
fn normalized_keys(raw: &RawTable, table: &TableSchema, key: &[String]) -> Result<Vec<Vec<String>>> {
    let columns = key
        .iter()
        .map(|k| {
            let field = table
                .field(k)
                .with_context(|| format!("key column `{}` not declared for {}", k, table.name))?;
            let cells = raw.column(raw.index_of(k)?);
            Ok(fill_nulls(coerce_column(field, &cells).column))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((0..raw.rows.len())
        .map(|row| columns.iter().map(|c| c.key_at(row)).collect())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MemoryReporter;
    use crate::table::{column, read_parquet};
    use arrow::array::{Array, Date32Array, Float64Array, Int64Array, StringArray};
    use std::fs;
    use tempfile::tempdir;

    const SCHEMA: &str = r#"
COLUMNS:
  Products:
    PRODUCTID: object
    PRODCATEGORYID: object
    CREATEDAT: int64
    PRICE: float64
    WEIGHTUNIT: object
  SalesOrderItems:
    SALESORDERID: int64
    SALESORDERITEM: int64
    QUANTITY: int64
    DELIVERYDATE: int64
PRIMARY_KEYS:
  Products: PRODUCTID
  SalesOrderItems: [SALESORDERID, SALESORDERITEM]
"#;

    fn init_test_logging() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("info")
            .with_test_writer()
            .try_init();
    }

    fn write_raw(dir: &Path) -> Result<()> {
        fs::write(
            dir.join("Products.csv"),
            "\u{feff}PRODUCTID,TYPECODE,PRODCATEGORYID,CREATEDAT,PRICE,WEIGHTUNIT\n\
             HT-1000,PR,LT,20181003,956.00,\n\
             HT-1001,PR,LT,20181005,,KG\n\
             HT-1000,PR,XX,20190101,1.00,G\n\
             HT-1002,PR,  ,bad,12.5,KG\n",
        )?;
        fs::write(
            dir.join("SalesOrderItems.csv"),
            "SALESORDERID,SALESORDERITEM,PRODUCTID,QUANTITY,DELIVERYDATE\n\
             500000000,10,HT-1000,4,20180111\n\
             500000000,20,HT-1001,,20180111\n\
             500000000,10,HT-1002,9,20180112\n",
        )?;
        fs::write(dir.join("Unknown.csv"), "A\n1\n")?;
        Ok(())
    }

    fn strings(batch: &RecordBatch, name: &str) -> Result<Vec<String>> {
        let arr = column(batch, name)?
            .as_any()
            .downcast_ref::<StringArray>()
            .map(|a| a.iter().map(|v| v.unwrap_or("<null>").to_string()).collect())
            .unwrap_or_default();
        Ok(arr)
    }

    #[test]
    fn cleans_products_and_items() -> Result<()> {
        init_test_logging();
        let raw = tempdir()?;
        let out = tempdir()?;
        write_raw(raw.path())?;
        let schema = Schema::from_yaml(SCHEMA)?;
        let reporter = MemoryReporter::new();

        let summary = transform_dir(raw.path(), out.path(), &schema, false, &reporter)?;
        assert_eq!(summary.written.len(), 2);
        assert_eq!(
            summary.skipped,
            vec![("Unknown.csv".to_string(), SkipReason::NoSchema)]
        );

        let products = read_parquet(&out.path().join("Products.parquet"))?;
        // primary key de-duplicated, first occurrence kept
        assert_eq!(
            strings(&products, "PRODUCTID")?,
            vec!["HT-1000", "HT-1001", "HT-1002"]
        );
        assert_eq!(strings(&products, "PRODCATEGORYID")?, vec!["LT", "LT", "N/A"]);
        // blank text cell becomes the sentinel
        assert_eq!(strings(&products, "WEIGHTUNIT")?, vec!["N/A", "KG", "KG"]);
        // declared columns only, in schema order
        let names: Vec<_> = products
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(
            names,
            vec!["PRODUCTID", "PRODCATEGORYID", "CREATEDAT", "PRICE", "WEIGHTUNIT"]
        );

        let created = column(&products, "CREATEDAT")?
            .as_any()
            .downcast_ref::<Date32Array>()
            .expect("CREATEDAT is a date");
        assert!(created.is_valid(0) && created.is_valid(1));
        assert!(created.is_null(2));

        let price = column(&products, "PRICE")?
            .as_any()
            .downcast_ref::<Float64Array>()
            .expect("PRICE is float");
        assert_eq!(price.values().to_vec(), vec![956.0, 0.0, 12.5]);
        assert_eq!(price.null_count(), 0);

        let items = read_parquet(&out.path().join("SalesOrderItems.parquet"))?;
        assert_eq!(items.num_rows(), 2);
        let qty = column(&items, "QUANTITY")?
            .as_any()
            .downcast_ref::<Int64Array>()
            .expect("QUANTITY is int");
        assert_eq!(qty.values().to_vec(), vec![4, 0]);

        assert!(reporter.events().contains(&Event::DuplicatesDropped {
            table: "SalesOrderItems".into(),
            key: vec!["SALESORDERID".into(), "SALESORDERITEM".into()],
            dropped: 1,
        }));
        Ok(())
    }

    #[test]
    fn missing_columns_skip_only_that_file() -> Result<()> {
        let raw = tempdir()?;
        let out = tempdir()?;
        write_raw(raw.path())?;
        fs::write(raw.path().join("Products.csv"), "PRODUCTID,PRICE\nHT-1,1\n")?;
        let schema = Schema::from_yaml(SCHEMA)?;

        let summary = transform_dir(raw.path(), out.path(), &schema, false, &MemoryReporter::new())?;
        assert!(summary.skipped.contains(&(
            "Products.csv".to_string(),
            SkipReason::MissingColumns(vec![
                "PRODCATEGORYID".into(),
                "CREATEDAT".into(),
                "WEIGHTUNIT".into()
            ])
        )));
        assert!(!out.path().join("Products.parquet").exists());
        assert!(out.path().join("SalesOrderItems.parquet").exists());
        Ok(())
    }

    #[test]
    fn rerun_is_byte_identical() -> Result<()> {
        let raw = tempdir()?;
        let out = tempdir()?;
        write_raw(raw.path())?;
        let schema = Schema::from_yaml(SCHEMA)?;

        transform_dir(raw.path(), out.path(), &schema, false, &MemoryReporter::new())?;
        let first = fs::read(out.path().join("Products.parquet"))?;
        transform_dir(raw.path(), out.path(), &schema, false, &MemoryReporter::new())?;
        let second = fs::read(out.path().join("Products.parquet"))?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn uncast_values_are_reported_or_fatal() -> Result<()> {
        let raw = tempdir()?;
        let out = tempdir()?;
        write_raw(raw.path())?;
        fs::write(
            raw.path().join("SalesOrderItems.csv"),
            "SALESORDERID,SALESORDERITEM,QUANTITY,DELIVERYDATE\n1,10,four,20180111\n2,10,5,20180111\n",
        )?;
        let schema = Schema::from_yaml(SCHEMA)?;

        let reporter = MemoryReporter::new();
        let summary = transform_dir(raw.path(), out.path(), &schema, false, &reporter)?;
        let items = summary
            .written
            .iter()
            .find(|o| o.table == "SalesOrderItems")
            .expect("items written");
        assert_eq!(items.uncast, vec![("QUANTITY".to_string(), 1)]);
        let batch = read_parquet(&items.path)?;
        assert_eq!(strings(&batch, "QUANTITY")?, vec!["four", "5"]);

        let err = transform_dir(raw.path(), out.path(), &schema, true, &MemoryReporter::new())
            .unwrap_err();
        assert!(err.to_string().contains("QUANTITY"));
        Ok(())
    }

    #[test]
    fn equal_keys_after_casting_are_duplicates() -> Result<()> {
        let raw = tempdir()?;
        let out = tempdir()?;
        fs::write(
            raw.path().join("SalesOrders.csv"),
            "SALESORDERID,NOTEID\n500,a\n 500,b\n500.0,c\n,d\nNULL,e\n0,f\n501,g\n",
        )?;
        let schema = Schema::from_yaml(
            "COLUMNS:\n  SalesOrders:\n    SALESORDERID: int64\n    NOTEID: object\n\
             PRIMARY_KEYS:\n  SalesOrders: SALESORDERID\n",
        )?;
        let reporter = MemoryReporter::new();

        let summary = transform_dir(raw.path(), out.path(), &schema, false, &reporter)?;
        assert_eq!(summary.written[0].duplicates_dropped, 4);

        let orders = read_parquet(&out.path().join("SalesOrders.parquet"))?;
        let ids = column(&orders, "SALESORDERID")?
            .as_any()
            .downcast_ref::<Int64Array>()
            .expect("SALESORDERID is int");
        // blank and NULL fill to 0, so the literal 0 row collides with them too
        assert_eq!(ids.values().to_vec(), vec![500, 0, 501]);
        assert_eq!(strings(&orders, "NOTEID")?, vec!["a", "d", "g"]);
        Ok(())
    }
}
