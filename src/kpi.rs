// src/kpi.rs
//! Sales figures computed from the presentation tables.

use anyhow::{anyhow, Result};
use arrow::{array::BooleanArray, compute::filter_record_batch, record_batch::RecordBatch};
use chrono::{Datelike, NaiveDate};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    path::Path,
};
use tracing::debug;

use crate::model::{left_join, DIM_CUSTOMER, DIM_DATE, DIM_EMPLOYEE, DIM_PRODUCT, FACT_SALES};
use crate::table::{column, date_values, display_values, f64_values, read_parquet, select_columns};

/// Column of `dim_product` used as the product category.
pub const CATEGORY_COLUMN: &str = "SHORT_DESCR_y";

#[derive(Debug, Clone)]
pub struct PresentationTables {
    pub fact_sales: RecordBatch,
    pub dim_customer: RecordBatch,
    pub dim_product: RecordBatch,
    pub dim_employee: RecordBatch,
    pub dim_date: RecordBatch,
}

/// Read the five presentation tables from `dir`.
pub fn load_presentation(dir: &Path) -> Result<PresentationTables> {
    let load = |name: &str| -> Result<RecordBatch> {
        let path = dir.join(format!("{}.parquet", name));
        if !path.exists() {
            return Err(anyhow!("Data file not found: {}.parquet", name));
        }
        read_parquet(&path)
    };
    Ok(PresentationTables {
        fact_sales: load(FACT_SALES)?,
        dim_customer: load(DIM_CUSTOMER)?,
        dim_product: load(DIM_PRODUCT)?,
        dim_employee: load(DIM_EMPLOYEE)?,
        dim_date: load(DIM_DATE)?,
    })
}

impl PresentationTables {
    /// First and last day of the calendar dimension.
    pub fn date_bounds(&self) -> Result<Option<(NaiveDate, NaiveDate)>> {
        let days: Vec<NaiveDate> = date_values(column(&self.dim_date, "Date")?.as_ref())?
            .into_iter()
            .flatten()
            .collect();
        Ok(days.iter().min().copied().zip(days.iter().max().copied()))
    }

    /// Sorted distinct countries, for building a filter.
    pub fn countries(&self) -> Result<Vec<String>> {
        distinct(&self.dim_customer, "COUNTRY")
    }

    /// Sorted distinct product categories, for building a filter.
    pub fn categories(&self) -> Result<Vec<String>> {
        distinct(&self.dim_product, CATEGORY_COLUMN)
    }
}

fn distinct(batch: &RecordBatch, name: &str) -> Result<Vec<String>> {
    let mut values: Vec<String> = display_values(column(batch, name)?)?
        .into_iter()
        .flatten()
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    values.sort();
    Ok(values)
}

/// Filters applied before aggregation. Empty lists mean "everything".
#[derive(Debug, Clone, Default)]
pub struct SalesFilter {
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub countries: Vec<String>,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SalesSummary {
    pub total_revenue: f64,
    pub total_orders: usize,
    pub avg_order_value: f64,
    pub total_quantity: f64,
    /// Descending by revenue.
    pub revenue_by_category: Vec<(String, f64)>,
    /// Descending by revenue.
    pub revenue_by_country: Vec<(String, f64)>,
    /// First day of each month, every month between the first and last order.
    pub monthly_revenue: Vec<(NaiveDate, f64)>,
}

impl SalesSummary {
    /// Scale every monetary figure by an exchange rate.
    pub fn converted(&self, rate: f64) -> Self {
        let scale = |v: &[(String, f64)]| -> Vec<(String, f64)> {
            v.iter().map(|(k, x)| (k.clone(), x * rate)).collect()
        };
        Self {
            total_revenue: self.total_revenue * rate,
            total_orders: self.total_orders,
            avg_order_value: self.avg_order_value * rate,
            total_quantity: self.total_quantity,
            revenue_by_category: scale(&self.revenue_by_category),
            revenue_by_country: scale(&self.revenue_by_country),
            monthly_revenue: self
                .monthly_revenue
                .iter()
                .map(|(m, x)| (*m, x * rate))
                .collect(),
        }
    }
}

/// Filter the fact table, enrich it with country and category, and aggregate.
pub fn summarize(tables: &PresentationTables, filter: &SalesFilter) -> Result<SalesSummary> {
    let mut sales = tables.fact_sales.clone();

    if let Some((start, end)) = filter.date_range {
        let dates = date_values(column(&sales, "OrderDate")?.as_ref())?;
        let mask: BooleanArray = dates
            .iter()
            .map(|d| Some(matches!(d, Some(d) if *d >= start && *d <= end)))
            .collect();
        sales = filter_record_batch(&sales, &mask)?;
    }

    let customers = select_columns(&tables.dim_customer, &["PARTNERID", "COUNTRY"])?;
    let products = select_columns(&tables.dim_product, &["PRODUCTID", CATEGORY_COLUMN])?;
    sales = left_join(&sales, &customers, "PARTNERID")?;
    sales = left_join(&sales, &products, "PRODUCTID")?;

    let countries = display_values(column(&sales, "COUNTRY")?)?;
    let categories = display_values(column(&sales, CATEGORY_COLUMN)?)?;
    let keep: BooleanArray = countries
        .iter()
        .zip(&categories)
        .map(|(country, category)| {
            Some(passes(&filter.countries, country) && passes(&filter.categories, category))
        })
        .collect();
    let sales = filter_record_batch(&sales, &keep)?;
    debug!(rows = sales.num_rows(), "filtered sales");

    let revenue = f64_values(column(&sales, "GROSSAMOUNT")?.as_ref())?;
    let quantity = f64_values(column(&sales, "QUANTITY")?.as_ref())?;
    let orders = display_values(column(&sales, "SALESORDERID")?)?;
    let countries = display_values(column(&sales, "COUNTRY")?)?;
    let categories = display_values(column(&sales, CATEGORY_COLUMN)?)?;
    let dates = date_values(column(&sales, "OrderDate")?.as_ref())?;

    let total_revenue: f64 = revenue.iter().flatten().sum();
    let total_quantity: f64 = quantity.iter().flatten().sum();
    let total_orders = orders.iter().flatten().collect::<HashSet<_>>().len();
    let avg_order_value = if total_orders > 0 {
        total_revenue / total_orders as f64
    } else {
        0.0
    };

    Ok(SalesSummary {
        total_revenue,
        total_orders,
        avg_order_value,
        total_quantity,
        revenue_by_category: revenue_by(&categories, &revenue),
        revenue_by_country: revenue_by(&countries, &revenue),
        monthly_revenue: monthly(&dates, &revenue),
    })
}

fn passes(allowed: &[String], value: &Option<String>) -> bool {
    allowed.is_empty() || value.as_ref().is_some_and(|v| allowed.contains(v))
}

/// Sum revenue per key, dropping null keys, largest first.
fn revenue_by(keys: &[Option<String>], revenue: &[Option<f64>]) -> Vec<(String, f64)> {
    let mut sums: HashMap<&str, f64> = HashMap::new();
    for (key, value) in keys.iter().zip(revenue) {
        if let Some(k) = key {
            *sums.entry(k.as_str()).or_default() += value.unwrap_or(0.0);
        }
    }
    let mut out: Vec<(String, f64)> = sums.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    out.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

fn month_start(d: NaiveDate) -> NaiveDate {
    d.with_day(1).unwrap_or(d)
}

fn next_month(d: NaiveDate) -> Option<NaiveDate> {
    let (y, m) = if d.month() == 12 {
        (d.year() + 1, 1)
    } else {
        (d.year(), d.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1)
}

/// Revenue per month with empty months filled with zero.
fn monthly(dates: &[Option<NaiveDate>], revenue: &[Option<f64>]) -> Vec<(NaiveDate, f64)> {
    let mut sums: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (date, value) in dates.iter().zip(revenue) {
        if let Some(d) = date {
            *sums.entry(month_start(*d)).or_default() += value.unwrap_or(0.0);
        }
    }
    let (Some(&first), Some(&last)) = (sums.keys().next(), sums.keys().next_back()) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let mut cursor = Some(first);
    while let Some(m) = cursor.filter(|m| *m <= last) {
        out.push((m, sums.get(&m).copied().unwrap_or(0.0)));
        cursor = next_month(m);
    }
    out
}
