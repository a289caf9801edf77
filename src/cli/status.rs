use comfy_table::{Cell, Table};
use serde_json::Value;

use crate::destination::sqlite::SqliteDestination;
use crate::destination::{Destination, Filter, Row};
use crate::error::Result;
use crate::models::OwnerId;
use crate::settings::Settings;

const RECENT_RUNS: usize = 10;

fn cell_text(row: &Row, column: &str) -> String {
    match row.get(column) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

pub fn run(settings: &Settings, user_id: Option<&str>) -> Result<()> {
    let owner: Option<OwnerId> = user_id.map(str::parse).transpose()?;
    let tables = &settings.tables;
    let db_path = settings.database_path();
    let dest = SqliteDestination::open(&db_path)?;

    let owner_filter = owner
        .as_ref()
        .map_or_else(Filter::all, |o| Filter::eq(&tables.owner_column, o.as_str()));

    println!("Database:      {}", db_path.display());
    println!("Categories:    {}", dest.count(&tables.categories, &Filter::all())?);
    println!("Expense types: {}", dest.count(&tables.types, &Filter::all())?);
    println!("Variants:      {}", settings.category_variants.len());
    match &owner {
        Some(o) => println!("Expenses:      {} (user {o})", dest.count(&tables.expenses, &owner_filter)?),
        None => println!("Expenses:      {}", dest.count(&tables.expenses, &Filter::all())?),
    }

    let Some(runs_table) = &tables.runs else {
        return Ok(());
    };
    let mut runs = match dest.read(runs_table, &owner_filter) {
        Ok(rows) => rows,
        Err(_) => {
            println!("\nNo run history ({runs_table} not found).");
            return Ok(());
        }
    };
    if runs.is_empty() {
        println!("\nNo migrations recorded yet.");
        return Ok(());
    }
    runs.sort_by_key(|r| std::cmp::Reverse(cell_text(r, "migrated_at")));

    let mut table = Table::new();
    table.set_header(vec!["When", "User", "File", "Read", "Inserted", "Verified", "Failed batches"]);
    for row in runs.iter().take(RECENT_RUNS) {
        table.add_row(vec![
            Cell::new(cell_text(row, "migrated_at")),
            Cell::new(cell_text(row, &tables.owner_column)),
            Cell::new(cell_text(row, "source_file")),
            Cell::new(cell_text(row, "rows_read")),
            Cell::new(cell_text(row, "inserted")),
            Cell::new(cell_text(row, "verified_count")),
            Cell::new(cell_text(row, "failed_batches")),
        ]);
    }
    println!("\nRecent migrations\n{table}");
    Ok(())
}
