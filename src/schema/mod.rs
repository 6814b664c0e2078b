pub mod arrow;
pub mod load;
pub mod types;

pub use arrow::{build_arrow_schema, field_arrow_type, map_to_arrow_type};
pub use load::{Schema, SchemaError};
pub use types::{has_date_suffix, Field, ScalarType, TableSchema};
