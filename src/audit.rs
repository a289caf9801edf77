use std::path::Path;

use serde_json::{json, Value};
use tracing::warn;

use crate::destination::{Destination, Filter, Row};
use crate::models::{MigrationResult, OwnerId};
use crate::settings::TableSettings;

/// How many earlier runs loaded this exact file for this owner. Read failures
/// count as zero.
pub fn previous_runs<D: Destination + ?Sized>(
    dest: &D,
    tables: &TableSettings,
    owner: &OwnerId,
    checksum: &str,
) -> usize {
    let Some(runs) = &tables.runs else {
        return 0;
    };
    let filter = Filter::eq(&tables.owner_column, owner.as_str()).and("checksum", checksum);
    dest.count(runs, &filter).unwrap_or_else(|e| {
        warn!("could not read run history from {runs}: {e}");
        0
    })
}

pub fn run_row(
    owner_column: &str,
    owner: &OwnerId,
    source: &Path,
    checksum: &str,
    rows_read: usize,
    result: &MigrationResult,
) -> Row {
    let mut row = Row::new();
    row.insert(owner_column.to_string(), json!(owner.as_str()));
    row.insert(
        "source_file".into(),
        json!(source.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()),
    );
    row.insert("checksum".into(), json!(checksum));
    row.insert("rows_read".into(), json!(rows_read));
    row.insert("attempted".into(), json!(result.attempted));
    row.insert("inserted".into(), json!(result.expected_count));
    row.insert("failed_batches".into(), json!(result.batch_errors.len()));
    row.insert("verified_count".into(), result.actual_count.map_or(Value::Null, |n| json!(n)));
    row.insert("migrated_at".into(), json!(chrono::Utc::now().to_rfc3339()));
    row
}

pub fn record_run<D: Destination + ?Sized>(dest: &mut D, tables: &TableSettings, row: Row) {
    let Some(runs) = &tables.runs else {
        return;
    };
    if let Err(e) = dest.write_batch(runs, &[row]) {
        warn!("could not record run in {runs}: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::memory::MemoryDestination;

    const OWNER: &str = "3f1c2a9e-8b7d-4c6e-9a12-0f3e5d7c9b1a";

    #[test]
    fn test_record_then_count_previous_runs() {
        let owner: OwnerId = OWNER.parse().unwrap();
        let tables = TableSettings::default();
        let mut dest = MemoryDestination::new();
        let result = MigrationResult { attempted: 2, expected_count: 2, actual_count: Some(2), ..Default::default() };
        let row = run_row(&tables.owner_column, &owner, Path::new("/tmp/export.csv"), "abc", 3, &result);
        assert_eq!(row["source_file"], "export.csv");
        record_run(&mut dest, &tables, row);
        assert_eq!(previous_runs(&dest, &tables, &owner, "abc"), 1);
        assert_eq!(previous_runs(&dest, &tables, &owner, "other"), 0);
    }

    #[test]
    fn test_disabled_audit_is_a_no_op() {
        let owner: OwnerId = OWNER.parse().unwrap();
        let tables = TableSettings { runs: None, ..TableSettings::default() };
        let mut dest = MemoryDestination::new();
        let row = run_row("user_id", &owner, Path::new("x.csv"), "abc", 0, &MigrationResult::default());
        record_run(&mut dest, &tables, row);
        assert!(dest.write_calls.is_empty());
        assert_eq!(previous_runs(&dest, &tables, &owner, "abc"), 0);
    }

    #[test]
    fn test_missing_runs_table_counts_as_zero() {
        let owner: OwnerId = OWNER.parse().unwrap();
        let dest = MemoryDestination::new();
        assert_eq!(previous_runs(&dest, &TableSettings::default(), &owner, "abc"), 0);
    }
}
