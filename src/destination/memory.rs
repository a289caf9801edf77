use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde_json::json;

use super::{Destination, Filter, Row};
use crate::error::{MigrateError, Result};

/// In-memory destination for tests. Tables spring into existence on first write.
#[derive(Debug, Default)]
pub struct MemoryDestination {
    tables: BTreeMap<String, Vec<Row>>,
    /// Per-call outcomes for `write_batch`: `Some(msg)` fails that call.
    scripted_failures: VecDeque<Option<String>>,
    /// 0-based write calls that always fail.
    failing_calls: BTreeSet<usize>,
    pub write_calls: Vec<usize>,
    pub unreachable: bool,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lookups(categories: &[(&str, &str)], types: &[(&str, &str)]) -> Self {
        let mut dest = Self::new();
        for (table, entries) in [("categories", categories), ("expense_types", types)] {
            let rows = entries
                .iter()
                .map(|(id, name)| {
                    let mut row = Row::new();
                    row.insert("id".into(), json!(id));
                    row.insert("name_vi".into(), json!(name));
                    row
                })
                .collect();
            dest.tables.insert(table.to_string(), rows);
        }
        dest.tables.insert("expenses".to_string(), Vec::new());
        dest
    }

    pub fn fail_call(mut self, call: usize) -> Self {
        self.failing_calls.insert(call);
        self
    }

    pub fn script(mut self, outcomes: Vec<Option<&str>>) -> Self {
        self.scripted_failures = outcomes.into_iter().map(|o| o.map(str::to_string)).collect();
        self
    }

    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables.get(table).map_or(&[], Vec::as_slice)
    }
}

impl Destination for MemoryDestination {
    fn read(&self, table: &str, filter: &Filter) -> Result<Vec<Row>> {
        if self.unreachable {
            return Err(MigrateError::Destination("connection refused".into()));
        }
        let rows = self
            .tables
            .get(table)
            .ok_or_else(|| MigrateError::Destination(format!("no such table: {table}")))?;
        Ok(rows.iter().filter(|r| filter.matches(r)).cloned().collect())
    }

    fn write_batch(&mut self, table: &str, rows: &[Row]) -> Result<usize> {
        let call = self.write_calls.len();
        self.write_calls.push(rows.len());
        if self.unreachable {
            return Err(MigrateError::Destination("connection refused".into()));
        }
        if let Some(Some(msg)) = self.scripted_failures.pop_front() {
            return Err(MigrateError::Destination(msg));
        }
        if self.failing_calls.contains(&call) {
            return Err(MigrateError::Destination(format!("write {call} rejected")));
        }
        self.tables.entry(table.to_string()).or_default().extend_from_slice(rows);
        Ok(rows.len())
    }
}
