// src/schema/load.rs

use serde_yaml::{Mapping, Value};
use std::{collections::BTreeMap, fs, path::Path};
use thiserror::Error;
use tracing::{debug, info};

use super::types::{Field, ScalarType, TableSchema};

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("reading schema file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("schema YAML syntax error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("schema has no COLUMNS section")]
    MissingColumns,

    #[error("table `{0}` declares no columns")]
    EmptyTable(String),

    #[error("table `{table}` column `{column}` has unknown type `{tag}`")]
    UnknownType {
        table: String,
        column: String,
        tag: String,
    },

    #[error("primary key declared for unknown table `{0}`")]
    KeyForUnknownTable(String),

    #[error("primary key column `{column}` is not declared in table `{table}`")]
    KeyColumnNotDeclared { table: String, column: String },

    #[error("malformed schema entry: {0}")]
    Malformed(String),
}

/// Every declared table, keyed by CSV file stem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    tables: BTreeMap<String, TableSchema>,
}

impl Schema {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let schema = Self::from_yaml(&text)?;
        info!(path = %path.display(), tables = schema.tables.len(), "schema loaded");
        Ok(schema)
    }

    pub fn from_yaml(text: &str) -> Result<Self, SchemaError> {
        let root: Value = serde_yaml::from_str(text)?;
        let columns = root
            .get("COLUMNS")
            .and_then(Value::as_mapping)
            .filter(|m| !m.is_empty())
            .ok_or(SchemaError::MissingColumns)?;

        let mut tables = BTreeMap::new();
        for (table, cols) in columns {
            let table = as_name(table)?;
            let fields = parse_fields(&table, cols)?;
            tables.insert(
                table.clone(),
                TableSchema {
                    name: table,
                    fields,
                    primary_key: None,
                },
            );
        }

        if let Some(keys) = root.get("PRIMARY_KEYS").and_then(Value::as_mapping) {
            for (table, key) in keys {
                let table = as_name(table)?;
                let key = parse_key(key)?;
                let entry = tables
                    .get_mut(&table)
                    .ok_or_else(|| SchemaError::KeyForUnknownTable(table.clone()))?;
                for column in &key {
                    if entry.field(column).is_none() {
                        return Err(SchemaError::KeyColumnNotDeclared {
                            table: table.clone(),
                            column: column.clone(),
                        });
                    }
                }
                debug!(table = %table, ?key, "primary key");
                entry.primary_key = Some(key);
            }
        }

        Ok(Self { tables })
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

fn as_name(v: &Value) -> Result<String, SchemaError> {
    match v {
        Value::String(s) => Ok(s.clone()),
        other => Err(SchemaError::Malformed(format!("expected a name, got {other:?}"))),
    }
}

fn parse_fields(table: &str, cols: &Value) -> Result<Vec<Field>, SchemaError> {
    let map: &Mapping = cols
        .as_mapping()
        .ok_or_else(|| SchemaError::Malformed(format!("columns of `{table}` must be a mapping")))?;
    if map.is_empty() {
        return Err(SchemaError::EmptyTable(table.to_string()));
    }
    map.iter()
        .map(|(name, tag)| {
            let name = as_name(name)?;
            let tag = as_name(tag)?;
            let ty = ScalarType::from_tag(&tag).ok_or_else(|| SchemaError::UnknownType {
                table: table.to_string(),
                column: name.clone(),
                tag,
            })?;
            Ok(Field::new(name, ty))
        })
        .collect()
}

fn parse_key(v: &Value) -> Result<Vec<String>, SchemaError> {
    match v {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Sequence(items) => items.iter().map(as_name).collect(),
        other => Err(SchemaError::Malformed(format!(
            "primary key must be a column or list, got {other:?}"
        ))),
    }
}
