use std::io::{BufRead, Write};
use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::destination::sqlite::SqliteDestination;
use crate::error::Result;
use crate::fmt::money;
use crate::models::{CleanedRecord, MigrationResult, OwnerId};
use crate::pipeline::{self, MigrationReport, MigrationRequest, Plan};
use crate::reference::ReferenceMap;
use crate::settings::{ReferencePolicy, Settings};
use crate::validator::ValidationReport;

pub struct MigrateArgs<'a> {
    pub csv: &'a Path,
    pub user_id: &'a str,
    pub yes: bool,
    pub dry_run: bool,
    pub tolerant: bool,
}

/// Ask once on `out`, read one line from `input`. Only `yes` proceeds.
pub fn confirm(input: &mut impl BufRead, out: &mut impl Write, ready: usize) -> Result<bool> {
    writeln!(out, "\n{}", "=".repeat(70))?;
    writeln!(out, "Ready to migrate {ready} expenses")?;
    writeln!(out, "{}", "=".repeat(70))?;
    write!(out, "Continue with migration? (yes/no): ")?;
    out.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

pub fn run(settings: &Settings, args: &MigrateArgs<'_>) -> Result<()> {
    let owner: OwnerId = args.user_id.parse()?;
    let policy = if args.tolerant {
        ReferencePolicy::Tolerant
    } else {
        settings.reference_policy
    };

    println!("{}", "=".repeat(70));
    println!("{:^70}", "Notion → Expenses Migration");
    println!("{}", "=".repeat(70));
    println!("CSV file:    {}", args.csv.display());
    println!("User ID:     {owner}");
    println!("Destination: {}", settings.database_path().display());

    let mut dest = SqliteDestination::open(&settings.database_path())?;
    let request = MigrationRequest {
        csv: args.csv.to_path_buf(),
        owner,
        policy,
        dry_run: args.dry_run,
    };

    let report = pipeline::run(settings, &mut dest, &request, |plan| {
        print_plan(plan, settings);
        if args.yes {
            return Ok(true);
        }
        let stdin = std::io::stdin();
        confirm(&mut stdin.lock(), &mut std::io::stdout(), plan.ready)
    })?;

    print_report(&report, settings, &request.owner);
    Ok(())
}

fn lookup_table(map: &ReferenceMap) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Name", "ID"]);
    for name in map.names() {
        table.add_row(vec![Cell::new(name), Cell::new(map.get(name).unwrap_or_default())]);
    }
    table
}

fn stats_table(v: &ValidationReport, settings: &Settings) -> Table {
    let amount = |val: Option<f64>| {
        val.map_or_else(|| "-".to_string(), |a| money(a, &settings.currency_symbol, settings.currency_decimals))
    };
    let mut table = Table::new();
    table.set_header(vec!["Statistic", "Value"]);
    table.add_row(vec![Cell::new("Total expenses"), Cell::new(v.total)]);
    table.add_row(vec![Cell::new("Unique categories"), Cell::new(v.distinct_categories)]);
    table.add_row(vec![Cell::new("Unique types"), Cell::new(v.distinct_types)]);
    let range = v
        .date_range
        .map_or_else(|| "-".to_string(), |(from, to)| format!("{from} to {to}"));
    table.add_row(vec![Cell::new("Date range"), Cell::new(range)]);
    table.add_row(vec![
        Cell::new("Amount range"),
        Cell::new(format!("{} to {}", amount(v.amount_min), amount(v.amount_max))),
    ]);
    table.add_row(vec![Cell::new("Total amount"), Cell::new(amount(Some(v.amount_sum)))]);
    table.add_row(vec![Cell::new("Zero amounts"), Cell::new(v.zero_amount_rows)]);
    table
}

const SAMPLE_ROWS: usize = 3;

/// First few cleaned rows, for a spot check before confirming.
fn sample_table(records: &[CleanedRecord], settings: &Settings) -> Table {
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    let mut table = Table::new();
    table.set_header(vec!["Name", "Amount", "Category", "Type", "Date", "Notes"]);
    for r in records.iter().take(SAMPLE_ROWS) {
        table.add_row(vec![
            Cell::new(text(&r.description)),
            Cell::new(money(r.amount, &settings.currency_symbol, settings.currency_decimals)),
            Cell::new(text(&r.category)),
            Cell::new(text(&r.kind)),
            Cell::new(r.date),
            Cell::new(text(&r.note)),
        ]);
    }
    table
}

fn print_plan(plan: &Plan<'_>, settings: &Settings) {
    for map in [&plan.maps.categories, &plan.maps.types] {
        println!("\n{} ({})\n{}", map.table(), map.len(), lookup_table(map));
    }

    let source = plan.source;
    println!();
    println!("Rows read:       {}", source.rows_read);
    println!("Rows retained:   {}", source.rows_retained());
    println!("Columns:         {}", source.headers.join(", "));
    if source.dropped_undated > 0 {
        println!("{}", format!("Removed {} rows with invalid dates", source.dropped_undated).yellow());
    }
    if source.amount_warnings > 0 {
        println!("{}", format!("{} amounts could not be parsed and were set to 0", source.amount_warnings).yellow());
    }
    if !source.records.is_empty() {
        println!("\nSample (first {} rows)\n{}", SAMPLE_ROWS.min(source.records.len()), sample_table(&source.records, settings));
    }
    println!("\nData statistics\n{}", stats_table(plan.validation, settings));

    if plan.skipped > 0 {
        println!("{}", format!("Skipping {} rows with unknown category/type", plan.skipped).yellow());
    }
    if plan.previous_runs > 0 {
        println!(
            "{}",
            format!(
                "This export was already migrated {} time(s) for this user. Continuing will duplicate rows.",
                plan.previous_runs
            )
            .red()
            .bold()
        );
    }
}

fn print_result(result: &MigrationResult) {
    println!("\nAttempted: {}", result.attempted);
    println!("Inserted:  {}", result.expected_count);
    match result.actual_count {
        Some(n) => println!("Found:     {n}"),
        None => println!("Found:     {}", "(count failed)".yellow()),
    }

    if !result.batch_errors.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Batch", "Error"]);
        for err in &result.batch_errors {
            table.add_row(vec![Cell::new(err.batch_index + 1), Cell::new(&err.message)]);
        }
        println!("\n{}\n{table}", format!("{} batch(es) failed", result.batch_errors.len()).red());
    }

    if result.verified() {
        println!("{}", "Migration verified successfully!".green());
    } else if let Some(actual) = result.actual_count {
        println!(
            "{}",
            format!("Warning: count mismatch ({actual} vs {})", result.expected_count).yellow()
        );
    }
}

fn print_report(report: &MigrationReport, settings: &Settings, owner: &OwnerId) {
    println!(
        "\nRows read {}, retained {}, undated {}, skipped {}",
        report.rows_read, report.rows_retained, report.dropped_undated, report.skipped
    );
    if report.amount_warnings + report.date_warnings > 0 {
        println!(
            "{}",
            format!(
                "{} amount and {} date value(s) could not be parsed",
                report.amount_warnings, report.date_warnings
            )
            .yellow()
        );
    }
    if report.previous_runs > 0 {
        println!("{}", format!("Earlier runs of this file: {}", report.previous_runs).yellow());
    }

    let Some(result) = &report.result else {
        println!("\nData statistics\n{}", stats_table(&report.validation, settings));
        println!(
            "{}",
            format!("Dry run: {} expenses ready, nothing written.", report.ready).cyan()
        );
        return;
    };

    if result.attempted == 0 {
        println!("{}", "No expenses to migrate; nothing written.".yellow());
        return;
    }

    print_result(result);
    println!("\n{}", "=".repeat(70));
    println!("{}", "Migration complete".green().bold());
    println!("{}", "=".repeat(70));
    println!("Migrated: {} expenses", result.expected_count);
    println!("User ID:  {owner}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirm_accepts_yes_only() {
        for (answer, expected) in [("yes\n", true), ("YES\n", true), (" yes \n", true), ("y\n", false), ("no\n", false), ("", false)] {
            let mut out = Vec::new();
            let got = confirm(&mut answer.as_bytes(), &mut out, 3).unwrap();
            assert_eq!(got, expected, "answer {answer:?}");
            assert!(String::from_utf8(out).unwrap().contains("Ready to migrate 3 expenses"));
        }
    }

    #[test]
    fn test_sample_table_shows_first_cleaned_rows() {
        let rec = |name: &str, amount: f64, day: u32| CleanedRecord {
            description: Some(name.to_string()),
            amount,
            category: Some("Sức khỏe".to_string()),
            kind: Some("Thiết yếu".to_string()),
            date: chrono::NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            note: None,
        };
        let records = vec![rec("Phở", 45000.0, 3), rec("Grab", 0.0, 4), rec("Thuốc", 30000.0, 5), rec("Extra", 1.0, 6)];
        let rendered = sample_table(&records, &Settings::default()).to_string();
        assert!(rendered.contains("Phở"));
        assert!(rendered.contains("₫45,000"));
        assert!(rendered.contains("Sức khỏe"));
        assert!(rendered.contains("2025-01-05"));
        assert!(!rendered.contains("Extra"));
    }

    #[test]
    fn test_stats_table_formats_amounts() {
        let report = ValidationReport {
            total: 2,
            amount_min: Some(1000.0),
            amount_max: Some(50000.0),
            amount_sum: 51000.0,
            ..Default::default()
        };
        let rendered = stats_table(&report, &Settings::default()).to_string();
        assert!(rendered.contains("₫1,000 to ₫50,000"));
        assert!(rendered.contains("₫51,000"));
    }
}
