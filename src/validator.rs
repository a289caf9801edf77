use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::error::{MigrateError, Result};
use crate::models::CleanedRecord;
use crate::reference::ReferenceMaps;
use crate::settings::ReferencePolicy;

/// Values with no lookup row, each with the number of rows carrying it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnresolvedReferences {
    pub categories: BTreeMap<String, usize>,
    pub types: BTreeMap<String, usize>,
}

impl UnresolvedReferences {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.types.is_empty()
    }

    pub fn affected_rows(&self) -> usize {
        self.categories.values().chain(self.types.values()).sum()
    }
}

impl fmt::Display for UnresolvedReferences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, values) in [("Categories", &self.categories), ("Types", &self.types)] {
            if values.is_empty() {
                continue;
            }
            writeln!(f, "{label} not in database:")?;
            for (value, count) in values {
                writeln!(f, "  • {value} ({count} expenses)")?;
            }
        }
        write!(
            f,
            "Tip: names must match the lookup table exactly (case-sensitive). \
             Add the missing rows to the destination, map the spelling under \
             `category_variants` in settings, or rerun with --tolerant to skip them."
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub total: usize,
    pub distinct_categories: usize,
    pub distinct_types: usize,
    pub unresolved: UnresolvedReferences,
    pub zero_amount_rows: usize,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub amount_min: Option<f64>,
    pub amount_max: Option<f64>,
    pub amount_sum: f64,
}

fn distinct<'a>(values: impl Iterator<Item = Option<&'a str>>) -> BTreeSet<&'a str> {
    values.flatten().collect()
}

fn unresolved_counts<'a>(
    records: &'a [CleanedRecord],
    present: &BTreeSet<&'a str>,
    field: impl Fn(&'a CleanedRecord) -> Option<&'a str>,
    known: impl Fn(&str) -> bool,
) -> BTreeMap<String, usize> {
    present
        .iter()
        .filter(|v| !known(v))
        .map(|v| {
            let count = records.iter().filter(|r| field(*r) == Some(*v)).count();
            (v.to_string(), count)
        })
        .collect()
}

pub fn check(records: &[CleanedRecord], maps: &ReferenceMaps) -> ValidationReport {
    let categories = distinct(records.iter().map(|r| r.category.as_deref()));
    let types = distinct(records.iter().map(|r| r.kind.as_deref()));

    let unresolved = UnresolvedReferences {
        categories: unresolved_counts(records, &categories, |r| r.category.as_deref(), |v| {
            maps.categories.contains(v)
        }),
        types: unresolved_counts(records, &types, |r| r.kind.as_deref(), |v| maps.types.contains(v)),
    };

    let dates = records.iter().map(|r| r.date);
    let date_range = dates.clone().min().zip(dates.max());
    let amounts = records.iter().map(|r| r.amount);

    ValidationReport {
        total: records.len(),
        distinct_categories: categories.len(),
        distinct_types: types.len(),
        unresolved,
        zero_amount_rows: records.iter().filter(|r| r.amount == 0.0).count(),
        date_range,
        amount_min: amounts.clone().reduce(f64::min),
        amount_max: amounts.clone().reduce(f64::max),
        amount_sum: amounts.sum(),
    }
}

/// Cross-check against the lookups. Under [`ReferencePolicy::Strict`] any
/// unresolved value aborts the run.
pub fn validate(records: &[CleanedRecord], maps: &ReferenceMaps, policy: ReferencePolicy) -> Result<ValidationReport> {
    let report = check(records, maps);

    if report.zero_amount_rows > 0 {
        warn!("{} expenses have zero amount", report.zero_amount_rows);
    }
    if !report.unresolved.is_empty() {
        match policy {
            ReferencePolicy::Strict => return Err(MigrateError::Validation(report.unresolved)),
            ReferencePolicy::Tolerant => {
                for (value, count) in report.unresolved.categories.iter().chain(&report.unresolved.types) {
                    warn!("unresolved value '{value}' on {count} rows will be skipped");
                }
                warn!("up to {} rows reference unknown values", report.unresolved.affected_rows());
            }
        }
    }
    info!(rows = report.total, "validated export");
    Ok(report)
}
