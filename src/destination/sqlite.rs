use std::path::Path;

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags};
use serde_json::{json, Value};
use tracing::debug;

use super::{check_identifier, Destination, Filter, Row};
use crate::error::{MigrateError, Result};
use crate::settings::TableSettings;

// (name, description)
const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("Ăn uống", "Meals and groceries"),
    ("Đi lại", "Transport, fuel, parking"),
    ("Quà vật", "Snacks"),
    ("Sức khỏe", "Health, pharmacy, clinic"),
    ("Biểu gia đình", "Gifts and support for family"),
    ("Mua sắm", "Shopping"),
    ("Hóa đơn", "Utilities and bills"),
    ("Giải trí", "Entertainment"),
    ("Giáo dục", "Courses and books"),
    ("Khác", "Anything else"),
];

const DEFAULT_TYPES: &[(&str, &str)] = &[
    ("Thiết yếu", "Essential spending"),
    ("Phát sinh", "Unplanned spending"),
    ("Lãng phí", "Avoidable spending"),
];

pub fn schema(tables: &TableSettings) -> Result<String> {
    let categories = check_identifier(&tables.categories)?;
    let types = check_identifier(&tables.types)?;
    let expenses = check_identifier(&tables.expenses)?;
    let id = check_identifier(&tables.id_column)?;
    let name = check_identifier(&tables.name_column)?;
    let owner = check_identifier(&tables.owner_column)?;

    let mut sql = format!(
        "
CREATE TABLE IF NOT EXISTS {categories} (
    {id} INTEGER PRIMARY KEY,
    {name} TEXT NOT NULL UNIQUE,
    description TEXT
);

CREATE TABLE IF NOT EXISTS {types} (
    {id} INTEGER PRIMARY KEY,
    {name} TEXT NOT NULL UNIQUE,
    description TEXT
);

CREATE TABLE IF NOT EXISTS {expenses} (
    id INTEGER PRIMARY KEY,
    {owner} TEXT NOT NULL,
    category_id INTEGER NOT NULL,
    type_id INTEGER NOT NULL,
    description TEXT,
    amount REAL NOT NULL DEFAULT 0,
    date TEXT NOT NULL,
    note TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (category_id) REFERENCES {categories}({id}),
    FOREIGN KEY (type_id) REFERENCES {types}({id})
);

CREATE INDEX IF NOT EXISTS idx_{expenses}_{owner} ON {expenses}({owner});
"
    );

    if let Some(runs) = &tables.runs {
        let runs = check_identifier(runs)?;
        sql.push_str(&format!(
            "
CREATE TABLE IF NOT EXISTS {runs} (
    id INTEGER PRIMARY KEY,
    {owner} TEXT NOT NULL,
    source_file TEXT NOT NULL,
    checksum TEXT NOT NULL,
    rows_read INTEGER,
    attempted INTEGER,
    inserted INTEGER,
    failed_batches INTEGER,
    verified_count INTEGER,
    migrated_at TEXT NOT NULL
);
"
        ));
    }
    Ok(sql)
}

pub struct SqliteDestination {
    conn: Connection,
}

impl SqliteDestination {
    /// Open an existing database. A missing file is a connectivity failure,
    /// never a silently created empty store.
    pub fn open(db_path: &Path) -> Result<Self> {
        if !db_path.exists() {
            return Err(MigrateError::Connectivity(format!(
                "no database at {}",
                db_path.display()
            )));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(db_path, flags)
            .and_then(|conn| {
                conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
                Ok(conn)
            })
            .map_err(|e| MigrateError::Connectivity(format!("{}: {e}", db_path.display())))?;
        Ok(Self { conn })
    }

    /// Create (or upgrade) a database with the expense schema and default lookups.
    pub fn create(db_path: &Path, tables: &TableSettings) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        init_db(&conn, tables)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

pub fn init_db(conn: &Connection, tables: &TableSettings) -> Result<()> {
    conn.execute_batch(&schema(tables)?)?;

    let name = &tables.name_column;
    for (table, seeds) in [(&tables.categories, DEFAULT_CATEGORIES), (&tables.types, DEFAULT_TYPES)] {
        let count: i64 = conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |row| row.get(0))?;
        if count == 0 {
            for (value, description) in seeds {
                conn.execute(
                    &format!("INSERT INTO {table} ({name}, description) VALUES (?1, ?2)"),
                    rusqlite::params![value, description],
                )?;
            }
        }
    }
    Ok(())
}

fn where_clause(filter: &Filter) -> Result<(String, Vec<SqlValue>)> {
    if filter.conditions().is_empty() {
        return Ok((String::new(), Vec::new()));
    }
    let mut parts = Vec::new();
    let mut params = Vec::new();
    for (i, (col, val)) in filter.conditions().iter().enumerate() {
        parts.push(format!("{} = ?{}", check_identifier(col)?, i + 1));
        params.push(to_sql(val));
    }
    Ok((format!(" WHERE {}", parts.join(" AND ")), params))
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => n
            .as_i64()
            .map_or_else(|| SqlValue::Real(n.as_f64().unwrap_or_default()), SqlValue::Integer),
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => json!(i),
        ValueRef::Real(f) => json!(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(hex::encode(b)),
    }
}

impl Destination for SqliteDestination {
    fn read(&self, table: &str, filter: &Filter) -> Result<Vec<Row>> {
        let (clause, params) = where_clause(filter)?;
        let sql = format!("SELECT * FROM {}{clause}", check_identifier(table)?);
        let mut stmt = self.conn.prepare(&sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                let mut out = Row::new();
                for (i, col) in columns.iter().enumerate() {
                    out.insert(col.clone(), from_sql(row.get_ref(i)?));
                }
                Ok(out)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// The whole batch commits or rolls back together.
    fn write_batch(&mut self, table: &str, rows: &[Row]) -> Result<usize> {
        let table = check_identifier(table)?;
        let tx = self.conn.transaction()?;
        for row in rows {
            let columns = row
                .keys()
                .map(|k| check_identifier(k))
                .collect::<Result<Vec<_>>>()?;
            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "INSERT INTO {table} ({}) VALUES ({})",
                columns.join(", "),
                placeholders.join(", ")
            );
            tx.prepare_cached(&sql)?
                .execute(params_from_iter(row.values().map(to_sql)))?;
        }
        tx.commit()?;
        debug!(table, rows = rows.len(), "batch committed");
        Ok(rows.len())
    }

    fn count(&self, table: &str, filter: &Filter) -> Result<usize> {
        let (clause, params) = where_clause(filter)?;
        let sql = format!("SELECT count(*) FROM {}{clause}", check_identifier(table)?);
        let count: i64 = self.conn.query_row(&sql, params_from_iter(params), |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, SqliteDestination) {
        let dir = tempfile::tempdir().unwrap();
        let dest = SqliteDestination::create(&dir.path().join("test.db"), &TableSettings::default()).unwrap();
        (dir, dest)
    }

    fn expense(owner: &str, category_id: i64, amount: f64) -> Row {
        let mut row = Row::new();
        row.insert("user_id".into(), json!(owner));
        row.insert("category_id".into(), json!(category_id.to_string()));
        row.insert("type_id".into(), json!("1"));
        row.insert("description".into(), json!("Phở"));
        row.insert("amount".into(), json!(amount));
        row.insert("date".into(), json!("2025-01-01"));
        row.insert("note".into(), Value::Null);
        row
    }

    #[test]
    fn test_create_makes_tables() {
        let (_dir, dest) = test_db();
        let tables: Vec<String> = dest
            .connection()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &["categories", "expense_types", "expenses", "migration_runs"] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, dest) = test_db();
        init_db(dest.connection(), &TableSettings::default()).unwrap();
        let count = dest.count("categories", &Filter::all()).unwrap();
        assert_eq!(count, DEFAULT_CATEGORIES.len());
    }

    #[test]
    fn test_open_missing_file_is_connectivity_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SqliteDestination::open(&dir.path().join("nope.db")).err().unwrap();
        assert!(matches!(err, MigrateError::Connectivity(_)));
    }

    #[test]
    fn test_read_returns_lookup_rows() {
        let (_dir, dest) = test_db();
        let rows = dest.read("expense_types", &Filter::eq("name_vi", "Phát sinh")).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0]["id"].is_i64());
    }

    #[test]
    fn test_write_batch_and_count() {
        let (_dir, mut dest) = test_db();
        let rows = vec![expense("u1", 1, 10.0), expense("u1", 2, 20.5), expense("u2", 1, 5.0)];
        assert_eq!(dest.write_batch("expenses", &rows).unwrap(), 3);
        assert_eq!(dest.count("expenses", &Filter::eq("user_id", "u1")).unwrap(), 2);
        let stored = dest.read("expenses", &Filter::eq("user_id", "u2")).unwrap();
        assert_eq!(stored[0]["amount"], json!(5.0));
        assert_eq!(stored[0]["category_id"], json!(1));
    }

    #[test]
    fn test_write_batch_rolls_back_on_constraint_violation() {
        let (_dir, mut dest) = test_db();
        let rows = vec![expense("u1", 1, 10.0), expense("u1", 999, 20.0)];
        assert!(dest.write_batch("expenses", &rows).is_err());
        assert_eq!(dest.count("expenses", &Filter::all()).unwrap(), 0);
    }

    #[test]
    fn test_read_rejects_bad_table_name() {
        let (_dir, dest) = test_db();
        assert!(dest.read("expenses; DROP TABLE expenses", &Filter::all()).is_err());
    }
}
