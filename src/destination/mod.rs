//! Storage boundary for the migration.
//!
//! The pipeline only talks to a [`Destination`]; rows travel as JSON object
//! maps so the same code drives the SQLite store and the in-memory fake used
//! in tests.

#[cfg(test)]
pub mod memory;
pub mod sqlite;

use serde_json::Value;

use crate::error::{MigrateError, Result};

pub type Row = serde_json::Map<String, Value>;

/// Conjunction of column equality checks. An empty filter matches every row.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self::all().and(column, value)
    }

    pub fn and(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions.push((column.to_string(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    #[cfg(test)]
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions
            .iter()
            .all(|(col, val)| row.get(col).is_some_and(|v| v == val))
    }
}

pub trait Destination {
    fn read(&self, table: &str, filter: &Filter) -> Result<Vec<Row>>;

    /// Insert `rows` in one call and return how many the store accepted.
    fn write_batch(&mut self, table: &str, rows: &[Row]) -> Result<usize>;

    fn count(&self, table: &str, filter: &Filter) -> Result<usize> {
        self.read(table, filter).map(|rows| rows.len())
    }
}

/// Table and column names are interpolated into SQL, so only plain identifiers pass.
pub fn check_identifier(name: &str) -> Result<&str> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(MigrateError::Destination(format!("invalid table or column name: {name:?}")))
    }
}
