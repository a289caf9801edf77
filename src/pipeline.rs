use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use crate::audit;
use crate::batch::{load_batches, RetryPolicy};
use crate::destination::Destination;
use crate::error::{MigrateError, Result};
use crate::loader::{load_source, SourceLoad};
use crate::models::{MigrationResult, OwnerId};
use crate::reference::{fetch_reference_maps, ReferenceMaps};
use crate::settings::{ReferencePolicy, Settings};
use crate::transformer::transform;
use crate::validator::{validate, ValidationReport};

pub struct MigrationRequest {
    pub csv: PathBuf,
    pub owner: OwnerId,
    pub policy: ReferencePolicy,
    pub dry_run: bool,
}

/// Everything known before the first write, shown at the confirmation gate.
pub struct Plan<'a> {
    pub maps: &'a ReferenceMaps,
    pub source: &'a SourceLoad,
    pub validation: &'a ValidationReport,
    pub skipped: usize,
    pub ready: usize,
    pub previous_runs: usize,
}

pub struct MigrationReport {
    pub rows_read: usize,
    pub rows_retained: usize,
    pub dropped_undated: usize,
    pub amount_warnings: usize,
    pub date_warnings: usize,
    pub validation: ValidationReport,
    pub skipped: usize,
    pub ready: usize,
    pub previous_runs: usize,
    /// `None` for a dry run.
    pub result: Option<MigrationResult>,
}

/// Run the migration end to end. `confirm` is called once, after the
/// transform and before any write; returning `false` cancels the run.
pub fn run<D, F>(settings: &Settings, dest: &mut D, request: &MigrationRequest, confirm: F) -> Result<MigrationReport>
where
    D: Destination + ?Sized,
    F: FnOnce(&Plan<'_>) -> Result<bool>,
{
    let tables = &settings.tables;

    let maps = fetch_reference_maps(&*dest, tables)?;
    let source = load_source(&request.csv, &settings.category_variants)?;
    let validation = validate(&source.records, &maps, request.policy)?;
    let transformed = transform(&source.records, &maps, &request.owner);
    let previous_runs = audit::previous_runs(&*dest, tables, &request.owner, &source.checksum);
    if previous_runs > 0 {
        warn!("this export was already migrated {previous_runs} time(s) for this owner; rows will be duplicated");
    }

    let mut report = MigrationReport {
        rows_read: source.rows_read,
        rows_retained: source.rows_retained(),
        dropped_undated: source.dropped_undated,
        amount_warnings: source.amount_warnings,
        date_warnings: source.date_warnings,
        validation,
        skipped: transformed.skipped,
        ready: transformed.records.len(),
        previous_runs,
        result: None,
    };

    if request.dry_run {
        info!("dry run, nothing written");
        return Ok(report);
    }

    if transformed.records.is_empty() {
        info!("nothing to load, destination left untouched");
        report.result = Some(MigrationResult::default());
        return Ok(report);
    }

    let plan = Plan {
        maps: &maps,
        source: &source,
        validation: &report.validation,
        skipped: report.skipped,
        ready: report.ready,
        previous_runs,
    };
    if !confirm(&plan)? {
        return Err(MigrateError::Cancelled);
    }

    let retry = RetryPolicy {
        retries: settings.write_retries,
        delay: Duration::from_millis(settings.retry_delay_ms),
    };
    let outcome = load_batches(
        &mut *dest,
        &tables.expenses,
        &tables.owner_column,
        &transformed.records,
        settings.batch_size,
        retry,
    );
    info!(batches = outcome.batches, inserted = outcome.inserted, "load finished");
    if !outcome.errors.is_empty() {
        warn!("{} batch(es) failed", outcome.errors.len());
    }

    let verification = crate::verifier::verify(
        &*dest,
        &tables.expenses,
        &tables.owner_column,
        &request.owner,
        outcome.inserted,
    );

    let result = MigrationResult {
        attempted: transformed.records.len(),
        expected_count: outcome.inserted,
        actual_count: verification.actual,
        batch_errors: outcome.errors,
    };

    let run_row = audit::run_row(
        &tables.owner_column,
        &request.owner,
        &request.csv,
        &source.checksum,
        source.rows_read,
        &result,
    );
    audit::record_run(dest, tables, run_row);

    report.result = Some(result);
    Ok(report)
}
