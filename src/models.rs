use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::{json, Value};

use crate::destination::Row;
use crate::error::{MigrateError, Result};

static OWNER_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").expect("owner id pattern is valid")
});

/// Account the migrated rows are attributed to, in canonical UUID text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OwnerId {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self> {
        if OWNER_ID_RE.is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(MigrateError::MalformedInput(s.to_string()))
        }
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of the export exactly as read, every cell optional text.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    pub line: u64,
    pub name: Option<String>,
    pub amount: Option<String>,
    pub category: Option<String>,
    pub kind: Option<String>,
    pub date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanedRecord {
    pub description: Option<String>,
    pub amount: f64,
    pub category: Option<String>,
    pub kind: Option<String>,
    pub date: NaiveDate,
    pub note: Option<String>,
}

/// The write-shape of one expense row.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationRecord {
    pub owner_id: String,
    pub category_id: String,
    pub type_id: String,
    pub description: Option<String>,
    pub amount: f64,
    pub date: NaiveDate,
    pub note: Option<String>,
}

impl DestinationRecord {
    pub fn to_row(&self, owner_column: &str) -> Row {
        let mut row = Row::new();
        row.insert(owner_column.to_string(), json!(self.owner_id));
        row.insert("category_id".into(), json!(self.category_id));
        row.insert("type_id".into(), json!(self.type_id));
        row.insert("description".into(), opt_text(&self.description));
        row.insert("amount".into(), json!(self.amount));
        row.insert("date".into(), json!(self.date.format("%Y-%m-%d").to_string()));
        row.insert("note".into(), opt_text(&self.note));
        row
    }
}

fn opt_text(value: &Option<String>) -> Value {
    value.as_ref().map_or(Value::Null, |s| Value::String(s.clone()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchError {
    pub batch_index: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct MigrationResult {
    /// Records handed to the batch loader.
    pub attempted: usize,
    /// Rows the destination reported as inserted.
    pub expected_count: usize,
    /// Rows counted for the owner after the load; `None` when the count failed.
    pub actual_count: Option<usize>,
    pub batch_errors: Vec<BatchError>,
}

impl MigrationResult {
    pub fn verified(&self) -> bool {
        self.actual_count == Some(self.expected_count)
    }
}
