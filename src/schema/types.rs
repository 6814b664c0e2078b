// src/schema/types.rs

use std::fmt;

/// Semantic type tag a declared column is coerced to.
#[derive(Debug, PartialEq, Clone, Copy, Eq, Hash)]
pub enum ScalarType {
    Int,
    Float,
    Bool,
    Text,
    Date,
}

impl ScalarType {
    /// Parse a pandas-style dtype name (`int64`, `object`, `datetime64[ns]`, ...).
    pub fn from_tag(tag: &str) -> Option<Self> {
        let lower = tag.trim().to_ascii_lowercase();
        let ty = match lower.as_str() {
            "int" | "integer" => Self::Int,
            s if s.starts_with("int") || s.starts_with("uint") => {
                let width = s.strip_prefix('u').unwrap_or(s).strip_prefix("int")?;
                if matches!(width, "" | "8" | "16" | "32" | "64") {
                    Self::Int
                } else {
                    return None;
                }
            }
            "float" | "float32" | "float64" | "double" | "number" | "decimal" => Self::Float,
            "bool" | "boolean" => Self::Bool,
            "object" | "str" | "string" | "text" | "category" => Self::Text,
            "date" | "datetime" | "datetime64" | "datetime64[ns]" | "timestamp" => Self::Date,
            _ => return None,
        };
        Some(ty)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Text => "text",
            Self::Date => "date",
        };
        f.write_str(s)
    }
}

/// A single declared column.
#[derive(Debug, PartialEq, Clone, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub ty: ScalarType,
    /// Parsed as `%Y%m%d` regardless of `ty`.
    pub is_date: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: ScalarType) -> Self {
        let name = name.into();
        let is_date = ty == ScalarType::Date || has_date_suffix(&name);
        Self { name, ty, is_date }
    }
}

/// `CREATEDAT`, `DELIVERYDATE`, `VALIDITY_STARTDATE`...
pub fn has_date_suffix(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with("date") || lower.ends_with("at")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub fields: Vec<Field>,
    pub primary_key: Option<Vec<String>>,
}

impl TableSchema {
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}
