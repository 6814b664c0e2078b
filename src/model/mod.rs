// src/model/mod.rs
pub mod date_dim;
pub mod join;

use anyhow::{anyhow, Context, Result};
use arrow::record_batch::RecordBatch;
use glob::glob;
use std::{collections::BTreeMap, path::Path};
use tracing::{error, info, instrument};

use crate::config::ModellingConfig;
use crate::report::{Event, Reporter};
use crate::table::{column, filter_eq, read_parquet, rename_columns, select_columns, write_parquet};
pub use date_dim::build_dim_date;
pub use join::left_join;

pub const FACT_SALES: &str = "fact_sales";
pub const DIM_CUSTOMER: &str = "dim_customer";
pub const DIM_PRODUCT: &str = "dim_product";
pub const DIM_EMPLOYEE: &str = "dim_employee";
pub const DIM_DATE: &str = "dim_date";

/// Header fields copied from `SalesOrders` onto every order item.
const ORDER_DETAILS: &[&str] = &[
    "SALESORDERID",
    "PARTNERID",
    "CREATEDBY",
    "CREATEDAT",
    "BILLINGSTATUS",
    "DELIVERYSTATUS",
    "LIFECYCLESTATUS",
];

const FACT_RENAMES: &[(&str, &str)] = &[
    ("CREATEDAT", "OrderDate"),
    ("CREATEDBY", "EMPLOYEEID"),
    ("BILLINGSTATUS", "BillingStatus"),
    ("DELIVERYSTATUS", "DeliveryStatus"),
    ("LIFECYCLESTATUS", "LifecycleStatus"),
];

/// The five presentation tables.
#[derive(Debug, Clone)]
pub struct StarSchema {
    pub fact_sales: RecordBatch,
    pub dim_customer: RecordBatch,
    pub dim_product: RecordBatch,
    pub dim_employee: RecordBatch,
    pub dim_date: RecordBatch,
}

impl StarSchema {
    pub fn tables(&self) -> [(&'static str, &RecordBatch); 5] {
        [
            (DIM_CUSTOMER, &self.dim_customer),
            (DIM_PRODUCT, &self.dim_product),
            (DIM_EMPLOYEE, &self.dim_employee),
            (DIM_DATE, &self.dim_date),
            (FACT_SALES, &self.fact_sales),
        ]
    }
}

/// Processed tables keyed by file stem.
pub type Tables = BTreeMap<String, RecordBatch>;

/// Load every `*.parquet` in `dir`, keyed by file stem.
pub fn load_processed_data(dir: &Path) -> Result<Tables> {
    let pattern = format!("{}/*.parquet", dir.display());
    let mut tables = Tables::new();
    for entry in glob(&pattern).context("invalid glob pattern for processed tables")? {
        let path = entry?;
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        tables.insert(stem.to_string(), read_parquet(&path)?);
    }
    info!("loaded {} processed tables", tables.len());
    Ok(tables)
}

fn get<'a>(tables: &'a Tables, name: &str) -> Result<&'a RecordBatch> {
    tables
        .get(name)
        .ok_or_else(|| anyhow!("processed table `{}` not found", name))
}

/// Join the processed tables into the star schema.
pub fn build_star_schema(tables: &Tables) -> Result<StarSchema> {
    // customers
    let dim_customer = left_join(
        get(tables, "BusinessPartners")?,
        get(tables, "Addresses")?,
        "ADDRESSID",
    )
    .context("building dim_customer")?;

    // products, English texts only
    let category_text = filter_eq(get(tables, "ProductCategoryText")?, "LANGUAGE", "EN")?;
    let product_text = filter_eq(get(tables, "ProductTexts")?, "LANGUAGE", "EN")?;
    let with_category = left_join(get(tables, "Products")?, &category_text, "PRODCATEGORYID")
        .context("joining product categories")?;
    let dim_product =
        left_join(&with_category, &product_text, "PRODUCTID").context("joining product texts")?;

    let dim_employee = get(tables, "Employees")?.clone();

    let sales_orders = get(tables, "SalesOrders")?;
    let dim_date = build_dim_date(column(sales_orders, "CREATEDAT")?.as_ref())
        .context("building dim_date")?;

    let order_details = select_columns(sales_orders, ORDER_DETAILS)?;
    let fact_sales = left_join(get(tables, "SalesOrderItems")?, &order_details, "SALESORDERID")
        .context("building fact_sales")?;
    let fact_sales = rename_columns(&fact_sales, FACT_RENAMES)?;

    Ok(StarSchema {
        fact_sales,
        dim_customer,
        dim_product,
        dim_employee,
        dim_date,
    })
}

/// Load processed tables, build the star schema and write it to `presentation_path`.
#[instrument(level = "info", skip_all, fields(out = %cfg.presentation_path.display()))]
pub fn run_modelling(cfg: &ModellingConfig, reporter: &dyn Reporter) -> Result<StarSchema> {
    write_star_schema(cfg, reporter).map_err(|e| {
        error!(error = ?e, "an error occurred during data modelling");
        e
    })
}

fn write_star_schema(cfg: &ModellingConfig, reporter: &dyn Reporter) -> Result<StarSchema> {
    info!("starting the data modelling process");
    let tables = load_processed_data(&cfg.processed_data_path)?;
    let star = build_star_schema(&tables)?;

    std::fs::create_dir_all(&cfg.presentation_path)
        .with_context(|| format!("creating {}", cfg.presentation_path.display()))?;
    for (name, batch) in star.tables() {
        let path = cfg.presentation_path.join(format!("{}.parquet", name));
        write_parquet(&path, batch).with_context(|| format!("writing {}", name))?;
        reporter.report(Event::TableWritten {
            table: name.to_string(),
            rows: batch.num_rows(),
            path,
        });
    }
    info!(
        "built and saved star schema tables to {}",
        cfg.presentation_path.display()
    );
    Ok(star)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MemoryReporter;
    use crate::table::{date_to_days, display_values};
    use arrow::array::{ArrayRef, Date32Array, Float64Array, Int64Array, StringArray};
    use chrono::NaiveDate;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn batch(cols: Vec<(&str, ArrayRef)>) -> RecordBatch {
        RecordBatch::try_from_iter(cols).expect("valid batch")
    }

    fn strs(v: &[&str]) -> ArrayRef {
        Arc::new(StringArray::from(v.to_vec()))
    }

    fn ints(v: &[i64]) -> ArrayRef {
        Arc::new(Int64Array::from(v.to_vec()))
    }

    fn day(y: i32, m: u32, d: u32) -> i32 {
        date_to_days(NaiveDate::from_ymd_opt(y, m, d).expect("date"))
    }

    fn sample_tables() -> Tables {
        let mut t = Tables::new();
        t.insert(
            "BusinessPartners".into(),
            batch(vec![
                ("PARTNERID", ints(&[100, 101])),
                ("COMPANYNAME", strs(&["SAP", "Acme"])),
                ("ADDRESSID", ints(&[1, 2])),
            ]),
        );
        t.insert(
            "Addresses".into(),
            batch(vec![("ADDRESSID", ints(&[1])), ("COUNTRY", strs(&["DE"]))]),
        );
        t.insert(
            "Products".into(),
            batch(vec![
                ("PRODUCTID", strs(&["HT-1000", "HT-1001"])),
                ("PRODCATEGORYID", strs(&["LT", "PC"])),
            ]),
        );
        t.insert(
            "ProductCategoryText".into(),
            batch(vec![
                ("PRODCATEGORYID", strs(&["LT", "LT", "PC"])),
                ("LANGUAGE", strs(&["EN", "DE", "EN"])),
                ("SHORT_DESCR", strs(&["Laptops", "Notebooks", "PCs"])),
            ]),
        );
        t.insert(
            "ProductTexts".into(),
            batch(vec![
                ("PRODUCTID", strs(&["HT-1000", "HT-1000", "HT-1001"])),
                ("LANGUAGE", strs(&["EN", "DE", "EN"])),
                ("SHORT_DESCR", strs(&["Notebook Basic 15", "Notebook Basis 15", "ITelO Vault"])),
            ]),
        );
        t.insert(
            "Employees".into(),
            batch(vec![("EMPLOYEEID", ints(&[1, 2])), ("NAME_FIRST", strs(&["Derrick", "Ellis"]))]),
        );
        t.insert(
            "SalesOrders".into(),
            batch(vec![
                ("SALESORDERID", ints(&[500, 501])),
                ("CREATEDBY", ints(&[1, 2])),
                (
                    "CREATEDAT",
                    Arc::new(Date32Array::from(vec![day(2018, 1, 30), day(2018, 2, 2)])),
                ),
                ("PARTNERID", ints(&[100, 101])),
                ("GROSSAMOUNT", Arc::new(Float64Array::from(vec![10.0, 20.0]))),
                ("BILLINGSTATUS", strs(&["C", "I"])),
                ("DELIVERYSTATUS", strs(&["C", "I"])),
                ("LIFECYCLESTATUS", strs(&["C", "I"])),
            ]),
        );
        t.insert(
            "SalesOrderItems".into(),
            batch(vec![
                ("SALESORDERID", ints(&[500, 500, 501, 999])),
                ("SALESORDERITEM", ints(&[10, 20, 10, 10])),
                ("PRODUCTID", strs(&["HT-1000", "HT-1001", "HT-1000", "HT-1001"])),
                ("GROSSAMOUNT", Arc::new(Float64Array::from(vec![4.0, 6.0, 20.0, 1.0]))),
                ("QUANTITY", ints(&[1, 2, 3, 4])),
            ]),
        );
        t
    }

    fn names(b: &RecordBatch) -> Vec<String> {
        b.schema().fields().iter().map(|f| f.name().clone()).collect()
    }

    #[test]
    fn builds_all_five_tables() -> Result<()> {
        let star = build_star_schema(&sample_tables())?;

        assert_eq!(star.dim_customer.num_rows(), 2);
        assert_eq!(
            display_values(column(&star.dim_customer, "COUNTRY")?)?,
            vec![Some("DE".to_string()), None]
        );

        assert_eq!(
            names(&star.dim_product),
            vec![
                "PRODUCTID",
                "PRODCATEGORYID",
                "LANGUAGE_x",
                "SHORT_DESCR_x",
                "LANGUAGE_y",
                "SHORT_DESCR_y"
            ]
        );
        assert_eq!(star.dim_product.num_rows(), 2);
        assert_eq!(
            display_values(column(&star.dim_product, "SHORT_DESCR_y")?)?,
            vec![Some("Notebook Basic 15".into()), Some("ITelO Vault".into())]
        );

        assert_eq!(star.dim_employee.num_rows(), 2);
        assert_eq!(star.dim_date.num_rows(), 4);

        assert_eq!(
            names(&star.fact_sales),
            vec![
                "SALESORDERID",
                "SALESORDERITEM",
                "PRODUCTID",
                "GROSSAMOUNT",
                "QUANTITY",
                "PARTNERID",
                "EMPLOYEEID",
                "OrderDate",
                "BillingStatus",
                "DeliveryStatus",
                "LifecycleStatus"
            ]
        );
        assert_eq!(star.fact_sales.num_rows(), 4);
        assert_eq!(
            display_values(column(&star.fact_sales, "PARTNERID")?)?,
            vec![Some("100".into()), Some("100".into()), Some("101".into()), None]
        );
        Ok(())
    }

    #[test]
    fn missing_source_table_is_fatal() {
        let mut tables = sample_tables();
        tables.remove("Addresses");
        let err = build_star_schema(&tables).unwrap_err();
        assert!(err.to_string().contains("Addresses"));
    }

    #[test]
    fn writes_presentation_files() -> Result<()> {
        let processed = tempdir()?;
        let presentation = tempdir()?;
        for (name, b) in sample_tables() {
            write_parquet(&processed.path().join(format!("{name}.parquet")), &b)?;
        }
        let cfg = ModellingConfig {
            root_dir: presentation.path().to_path_buf(),
            processed_data_path: processed.path().to_path_buf(),
            presentation_path: presentation.path().join("out"),
        };
        let reporter = MemoryReporter::new();
        run_modelling(&cfg, &reporter)?;

        for name in [FACT_SALES, DIM_CUSTOMER, DIM_PRODUCT, DIM_EMPLOYEE, DIM_DATE] {
            let path = cfg.presentation_path.join(format!("{name}.parquet"));
            assert!(path.exists(), "{} missing", name);
        }
        let dim_date = read_parquet(&cfg.presentation_path.join("dim_date.parquet"))?;
        assert_eq!(dim_date.num_rows(), 4);
        assert_eq!(reporter.events().len(), 5);
        Ok(())
    }
}
