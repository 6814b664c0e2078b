use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use std::{collections::HashSet, fs, hash::Hash, path::Path};

use crate::process::utils::{clean_header, decode_text};
use crate::schema::TableSchema;

#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// File stem the table was read from.
    pub name: String,
    /// Column names after BOM stripping and trimming.
    pub headers: Vec<String>,
    /// Each data row, padded to `headers.len()` with empty cells.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Read a CSV file with a header row, tolerating non-UTF-8 input.
    pub fn read_csv(path: &Path, name: &str) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("reading raw CSV {}", path.display()))?;
        let text = decode_text(&bytes);

        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = rdr
            .headers()
            .with_context(|| format!("CSV header error in {}", path.display()))?
            .iter()
            .map(clean_header)
            .collect();

        let mut rows = Vec::new();
        for (idx, result) in rdr.records().enumerate() {
            let record = result
                .with_context(|| format!("CSV parse error in {} at record {}", path.display(), idx))?;
            if record.len() > headers.len() {
                bail!(
                    "{} record {}: expected {} fields, saw {}",
                    path.display(),
                    idx,
                    headers.len(),
                    record.len()
                );
            }
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(Self {
            name: name.to_string(),
            headers,
            rows,
        })
    }

    /// Declared columns that the file does not carry, in declaration order.
    pub fn missing_columns(&self, schema: &TableSchema) -> Vec<String> {
        let have: HashSet<&str> = self.headers.iter().map(String::as_str).collect();
        schema
            .column_names()
            .filter(|c| !have.contains(c))
            .map(str::to_string)
            .collect()
    }

    /// Keep exactly the declared columns, in schema order.
    pub fn project(self, schema: &TableSchema) -> Result<Self> {
        let indices = schema
            .column_names()
            .map(|c| {
                self.headers
                    .iter()
                    .position(|h| h == c)
                    .with_context(|| format!("column `{}` missing from {}", c, self.name))
            })
            .collect::<Result<Vec<_>>>()?;

        let rows = self
            .rows
            .into_iter()
            .map(|mut row| {
                indices
                    .iter()
                    .map(|&i| std::mem::take(&mut row[i]))
                    .collect()
            })
            .collect();

        Ok(Self {
            name: self.name,
            headers: schema.column_names().map(str::to_string).collect(),
            rows,
        })
    }

    /// Drop rows whose key was already seen; the first occurrence wins.
    /// `keys` holds one key per row. Returns the number of rows removed.
    pub fn drop_duplicates_by<K: Hash + Eq>(&mut self, keys: Vec<K>) -> Result<usize> {
        if keys.len() != self.rows.len() {
            bail!(
                "{}: {} keys for {} rows",
                self.name,
                keys.len(),
                self.rows.len()
            );
        }
        let before = self.rows.len();
        let mut seen = HashSet::with_capacity(before);
        let mut keys = keys.into_iter();
        self.rows
            .retain(|_| keys.next().is_some_and(|k| seen.insert(k)));
        Ok(before - self.rows.len())
    }

    /// Position of a header.
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("column `{}` missing from {}", name, self.name))
    }

    pub fn column(&self, idx: usize) -> Vec<&str> {
        self.rows.iter().map(|r| r[idx].as_str()).collect()
    }
}
