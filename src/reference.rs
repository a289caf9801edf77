use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{info, warn};

use crate::destination::{Destination, Filter, Row};
use crate::error::{MigrateError, Result};
use crate::settings::TableSettings;

/// Canonical display name → destination identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceMap {
    table: String,
    entries: BTreeMap<String, String>,
}

impl ReferenceMap {
    pub fn from_pairs<I, K, V>(table: &str, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            table: table.to_string(),
            entries: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

pub struct ReferenceMaps {
    pub categories: ReferenceMap,
    pub types: ReferenceMap,
}

fn column_text(row: &Row, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn fetch_map<D: Destination + ?Sized>(dest: &D, table: &str, tables: &TableSettings) -> Result<ReferenceMap> {
    let rows = dest
        .read(table, &Filter::all())
        .map_err(|e| MigrateError::Connectivity(format!("reading {table}: {e}")))?;

    let mut pairs = Vec::with_capacity(rows.len());
    for row in &rows {
        let id = column_text(row, &tables.id_column);
        let name = column_text(row, &tables.name_column);
        match (id, name) {
            (Some(id), Some(name)) => pairs.push((name, id)),
            _ => {
                return Err(MigrateError::Connectivity(format!(
                    "{table} rows must carry '{}' and '{}' columns",
                    tables.id_column, tables.name_column
                )))
            }
        }
    }
    let map = ReferenceMap::from_pairs(table, pairs);
    if map.is_empty() {
        warn!("{} is empty; every row will be unresolved", map.table());
    }
    info!(table, entries = map.len(), "fetched lookup table");
    Ok(map)
}

pub fn fetch_reference_maps<D: Destination + ?Sized>(dest: &D, tables: &TableSettings) -> Result<ReferenceMaps> {
    Ok(ReferenceMaps {
        categories: fetch_map(dest, &tables.categories, tables)?,
        types: fetch_map(dest, &tables.types, tables)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::memory::MemoryDestination;

    #[test]
    fn test_fetch_reference_maps() {
        let dest = MemoryDestination::with_lookups(
            &[("c1", "Ăn uống"), ("c2", "Đi lại")],
            &[("t1", "Thiết yếu")],
        );
        let maps = fetch_reference_maps(&dest, &TableSettings::default()).unwrap();
        assert_eq!(maps.categories.get("Đi lại"), Some("c2"));
        assert_eq!(maps.types.get("Thiết yếu"), Some("t1"));
        assert_eq!(maps.categories.names().collect::<Vec<_>>(), vec!["Ăn uống", "Đi lại"]);
        assert!(!maps.categories.contains("Khác"));
    }

    #[test]
    fn test_unreachable_destination_is_connectivity_error() {
        let mut dest = MemoryDestination::with_lookups(&[], &[]);
        dest.unreachable = true;
        let err = fetch_reference_maps(&dest, &TableSettings::default()).err().unwrap();
        assert!(matches!(err, MigrateError::Connectivity(_)));
    }

    #[test]
    fn test_missing_table_is_connectivity_error() {
        let dest = MemoryDestination::new();
        assert!(matches!(
            fetch_map(&dest, "categories", &TableSettings::default()),
            Err(MigrateError::Connectivity(_))
        ));
    }

    #[test]
    fn test_numeric_ids_become_text() {
        let dir = tempfile::tempdir().unwrap();
        let dest = crate::destination::sqlite::SqliteDestination::create(
            &dir.path().join("ref.db"),
            &TableSettings::default(),
        )
        .unwrap();
        let maps = fetch_reference_maps(&dest, &TableSettings::default()).unwrap();
        assert_eq!(maps.categories.get("Ăn uống"), Some("1"));
        assert!(maps.types.contains("Phát sinh"));
    }
}
