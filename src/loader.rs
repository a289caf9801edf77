use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{MigrateError, Result};
use crate::models::{CleanedRecord, RawRecord};
use crate::normalize::{clean_amount, clean_text, normalize_category, parse_date, CategoryVariants};

const REQUIRED_COLUMNS: &[&str] = &["Name", "Amount", "Category", "Type", "Date"];
const NOTES_COLUMN: &str = "Notes";

pub struct SourceLoad {
    /// Header names as they appear in the export, trimmed.
    pub headers: Vec<String>,
    pub records: Vec<CleanedRecord>,
    pub rows_read: usize,
    pub dropped_undated: usize,
    pub amount_warnings: usize,
    pub date_warnings: usize,
    pub checksum: String,
}

impl SourceLoad {
    pub fn rows_retained(&self) -> usize {
        self.records.len()
    }
}

struct Columns {
    name: usize,
    amount: usize,
    category: usize,
    kind: usize,
    date: usize,
    notes: Option<usize>,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Result<Self> {
        let names: Vec<&str> = headers
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim())
            .collect();
        let find = |wanted: &str| names.iter().position(|h| *h == wanted);

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|c| find(c).is_none())
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(MigrateError::MissingColumns(missing));
        }
        let idx = |wanted: &str| find(wanted).unwrap_or_default();
        Ok(Self {
            name: idx("Name"),
            amount: idx("Amount"),
            category: idx("Category"),
            kind: idx("Type"),
            date: idx("Date"),
            notes: find(NOTES_COLUMN),
        })
    }

    fn raw(&self, record: &csv::StringRecord) -> RawRecord {
        let cell = |i: usize| record.get(i).map(str::to_string);
        RawRecord {
            line: record.position().map_or(0, csv::Position::line),
            name: cell(self.name),
            amount: cell(self.amount),
            category: cell(self.category),
            kind: cell(self.kind),
            date: cell(self.date),
            notes: self.notes.and_then(cell),
        }
    }
}

fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

/// Header names plus every data row, before any cleaning.
pub fn read_raw(file_path: &Path) -> Result<(Vec<String>, Vec<RawRecord>)> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(file_path)?;
    let header_record = rdr.headers()?.clone();
    let columns = Columns::locate(&header_record)?;
    let headers = header_record
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    let mut rows = Vec::new();
    for result in rdr.records() {
        rows.push(columns.raw(&result?));
    }
    Ok((headers, rows))
}

pub fn load_source(file_path: &Path, variants: &CategoryVariants) -> Result<SourceLoad> {
    if !file_path.exists() {
        let resolved = std::path::absolute(file_path).unwrap_or_else(|_| file_path.to_path_buf());
        return Err(MigrateError::NotFound {
            path: file_path.to_path_buf(),
            resolved,
        });
    }

    let checksum = compute_checksum(file_path)?;
    let (headers, raw) = read_raw(file_path)?;
    let rows_read = raw.len();
    info!(file = %file_path.display(), rows = rows_read, "read export");

    let mut records = Vec::with_capacity(rows_read);
    let mut dropped_undated = 0usize;
    let mut amount_warnings = 0usize;
    let mut date_warnings = 0usize;

    for row in &raw {
        let amount = clean_amount(row.amount.as_deref(), &mut amount_warnings);
        let Some(date) = parse_date(row.date.as_deref(), &mut date_warnings) else {
            debug!(line = row.line, "dropping row without a usable date");
            dropped_undated += 1;
            continue;
        };
        records.push(CleanedRecord {
            description: clean_text(row.name.as_deref()),
            amount,
            category: normalize_category(clean_text(row.category.as_deref()), variants),
            kind: clean_text(row.kind.as_deref()),
            date,
            note: clean_text(row.notes.as_deref()),
        });
    }

    if dropped_undated > 0 {
        warn!("removed {dropped_undated} rows with missing or invalid dates");
    }
    info!(retained = records.len(), "cleaned export");

    Ok(SourceLoad {
        headers,
        records,
        rows_read,
        dropped_undated,
        amount_warnings,
        date_warnings,
        checksum,
    })
}
