// src/schema/arrow.rs

use arrow::datatypes::{DataType, Field as ArrowField, Schema as ArrowSchema};
use std::sync::Arc;

use super::types::{Field, ScalarType};

/// Map a declared scalar type into an Arrow DataType.
///
/// - Int   → Int64
/// - Float → Float64
/// - Bool  → Boolean
/// - Text  → Utf8
/// - Date  → Date32
pub fn map_to_arrow_type(ty: ScalarType) -> DataType {
    match ty {
        ScalarType::Int => DataType::Int64,
        ScalarType::Float => DataType::Float64,
        ScalarType::Bool => DataType::Boolean,
        ScalarType::Text => DataType::Utf8,
        ScalarType::Date => DataType::Date32,
    }
}

/// Arrow type a declared field lands as when every value casts cleanly.
pub fn field_arrow_type(field: &Field) -> DataType {
    if field.is_date {
        DataType::Date32
    } else {
        map_to_arrow_type(field.ty)
    }
}

/// Build an ArrowSchema (inside an Arc) from declared fields.
pub fn build_arrow_schema(fields: &[Field]) -> Arc<ArrowSchema> {
    let fields: Vec<ArrowField> = fields
        .iter()
        .map(|f| ArrowField::new(&f.name, field_arrow_type(f), /* nullable = */ true))
        .collect();

    Arc::new(ArrowSchema::new(fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_suffix_overrides_declared_type() {
        let schema = build_arrow_schema(&[
            Field::new("CREATEDAT", ScalarType::Int),
            Field::new("PRICE", ScalarType::Float),
        ]);
        assert_eq!(schema.field(0).data_type(), &DataType::Date32);
        assert_eq!(schema.field(1).data_type(), &DataType::Float64);
    }
}
