use crate::process::{date_parser, utils::is_null_token};
use crate::schema::{Field, ScalarType};
use crate::table::date_to_days;
use arrow::{
    array::{ArrayRef, BooleanArray, Date32Array, Float64Array, Int64Array, StringArray},
    datatypes::DataType,
};
use std::sync::Arc;

/// Sentinel written into text cells that are still null after cleaning.
pub const TEXT_FILL: &str = "N/A";

/// One cleaned column, before it becomes an Arrow array.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedColumn {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
    /// Days since the Unix epoch.
    Date(Vec<Option<i32>>),
    Text(Vec<Option<String>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Coerced {
    pub column: TypedColumn,
    /// Non-null cells that did not parse as the declared type. When non-zero
    /// the column has been kept as text.
    pub uncast: usize,
}

/// Coerce raw cells into the declared type of `field`.
///
/// Date fields parse `YYYYMMDD` and turn anything else into null. Other fields
/// are cast as a whole column; if any cell fails, the raw text is kept.
/// Whitespace-only cells and NA markers become null in every case.
pub fn coerce_column(field: &Field, raw: &[&str]) -> Coerced {
    if field.is_date {
        let days = raw
            .iter()
            .map(|s| date_parser::parse_yyyymmdd(s).map(date_to_days))
            .collect();
        return Coerced {
            column: TypedColumn::Date(days),
            uncast: 0,
        };
    }

    let cast = match field.ty {
        ScalarType::Int => cast_all(raw, parse_int).map(TypedColumn::Int),
        ScalarType::Float => cast_all(raw, |s| s.parse::<f64>().ok()).map(TypedColumn::Float),
        ScalarType::Bool => cast_all(raw, parse_bool).map(TypedColumn::Bool),
        // A Date tag always sets `is_date`.
        ScalarType::Text | ScalarType::Date => Ok(TypedColumn::Text(text_values(raw))),
    };

    match cast {
        Ok(column) => Coerced { column, uncast: 0 },
        Err(uncast) => Coerced {
            column: TypedColumn::Text(text_values(raw)),
            uncast,
        },
    }
}

/// Parse every non-null cell; on failure return how many cells did not parse.
fn cast_all<T>(raw: &[&str], parse: impl Fn(&str) -> Option<T>) -> Result<Vec<Option<T>>, usize> {
    let mut out = Vec::with_capacity(raw.len());
    let mut failed = 0;
    for s in raw {
        if is_null_token(s) {
            out.push(None);
            continue;
        }
        match parse(s.trim()) {
            Some(v) => out.push(Some(v)),
            None => failed += 1,
        }
    }
    if failed == 0 {
        Ok(out)
    } else {
        Err(failed)
    }
}

fn text_values(raw: &[&str]) -> Vec<Option<String>> {
    raw.iter()
        .map(|s| (!is_null_token(s)).then(|| s.to_string()))
        .collect()
}

/// Integers, also accepting whole floats such as `12.0`.
fn parse_int(s: &str) -> Option<i64> {
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    let f = s.parse::<f64>().ok()?;
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Numeric nulls → 0, boolean nulls → false, text nulls → "N/A". Dates keep their nulls.
pub fn fill_nulls(column: TypedColumn) -> TypedColumn {
    match column {
        TypedColumn::Int(v) => TypedColumn::Int(v.into_iter().map(|x| Some(x.unwrap_or(0))).collect()),
        TypedColumn::Float(v) => {
            TypedColumn::Float(v.into_iter().map(|x| Some(x.unwrap_or(0.0))).collect())
        }
        TypedColumn::Bool(v) => {
            TypedColumn::Bool(v.into_iter().map(|x| Some(x.unwrap_or(false))).collect())
        }
        TypedColumn::Text(v) => TypedColumn::Text(
            v.into_iter()
                .map(|x| Some(x.unwrap_or_else(|| TEXT_FILL.to_string())))
                .collect(),
        ),
        dates @ TypedColumn::Date(_) => dates,
    }
}

impl TypedColumn {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Int(_) => DataType::Int64,
            Self::Float(_) => DataType::Float64,
            Self::Bool(_) => DataType::Boolean,
            Self::Date(_) => DataType::Date32,
            Self::Text(_) => DataType::Utf8,
        }
    }

    /// Hashable form of one cell, equal exactly when the written values are equal.
    pub fn key_at(&self, row: usize) -> String {
        let cell = match self {
            Self::Int(v) => v[row].map(|x| x.to_string()),
            // -0.0 and 0.0 are the same key
            Self::Float(v) => v[row].map(|x| (x + 0.0).to_bits().to_string()),
            Self::Bool(v) => v[row].map(|x| x.to_string()),
            Self::Date(v) => v[row].map(|x| x.to_string()),
            Self::Text(v) => v[row].clone(),
        };
        cell.unwrap_or_default()
    }

    pub fn into_array(self) -> ArrayRef {
        match self {
            Self::Int(v) => Arc::new(Int64Array::from(v)),
            Self::Float(v) => Arc::new(Float64Array::from(v)),
            Self::Bool(v) => Arc::new(BooleanArray::from(v)),
            Self::Date(v) => Arc::new(Date32Array::from(v)),
            Self::Text(v) => Arc::new(StringArray::from(v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn date_fields_become_dates_or_null() {
        let f = Field::new("CREATEDAT", ScalarType::Int);
        let c = coerce_column(&f, &["20181003", "garbage", "", "2018-10-03"]);
        let day = date_to_days(NaiveDate::from_ymd_opt(2018, 10, 3).unwrap());
        assert_eq!(c.column, TypedColumn::Date(vec![Some(day), None, None, None]));
        assert_eq!(c.uncast, 0);
    }

    #[test]
    fn clean_int_column_casts() {
        let f = Field::new("QUANTITY", ScalarType::Int);
        let c = coerce_column(&f, &["1", " 2 ", "3.0", "", "NULL"]);
        assert_eq!(
            c.column,
            TypedColumn::Int(vec![Some(1), Some(2), Some(3), None, None])
        );
        assert_eq!(fill_nulls(c.column), TypedColumn::Int(vec![Some(1), Some(2), Some(3), Some(0), Some(0)]));
    }

    #[test]
    fn failed_cast_keeps_raw_text_and_counts() {
        let f = Field::new("PARTNERID", ScalarType::Int);
        let c = coerce_column(&f, &["100", "ABC", "", "x1"]);
        assert_eq!(c.uncast, 2);
        assert_eq!(
            fill_nulls(c.column),
            TypedColumn::Text(vec![
                Some("100".into()),
                Some("ABC".into()),
                Some("N/A".into()),
                Some("x1".into())
            ])
        );
    }

    #[test]
    fn whitespace_text_becomes_sentinel() {
        let f = Field::new("NOTEID", ScalarType::Text);
        let c = fill_nulls(coerce_column(&f, &["  ", "note", ""]).column);
        assert_eq!(
            c,
            TypedColumn::Text(vec![Some("N/A".into()), Some("note".into()), Some("N/A".into())])
        );
    }

    #[test]
    fn floats_and_bools() {
        let f = Field::new("PRICE", ScalarType::Float);
        let c = fill_nulls(coerce_column(&f, &["1.5", "nan", "2"]).column);
        assert_eq!(c, TypedColumn::Float(vec![Some(1.5), Some(0.0), Some(2.0)]));

        let f = Field::new("ACTIVE", ScalarType::Bool);
        let c = fill_nulls(coerce_column(&f, &["True", "0", ""]).column);
        assert_eq!(c, TypedColumn::Bool(vec![Some(true), Some(false), Some(false)]));
    }
}
