use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

const DATE_FORMATS: &[&str] = &["%B %d, %Y", "%Y-%m-%d"];
const CURRENCY_SYMBOLS: &[char] = &['₫', '$', '€', '£', '¥'];

/// Known source-side spellings mapped to the destination's canonical name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryVariants(BTreeMap<String, String>);

impl CategoryVariants {
    pub fn new(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }

    pub fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        self.0.get(name).map_or(name, String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl Default for CategoryVariants {
    fn default() -> Self {
        let map = [
            ("Quà vặt", "Quà vật"),
            ("Sức khoẻ", "Sức khỏe"),
            ("Biếu gia đình", "Biểu gia đình"),
        ]
        .into_iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();
        Self::new(map)
    }
}

/// A cell that could not be read; the record survives with a default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldParseWarning {
    Amount(String),
    Date(String),
}

impl fmt::Display for FieldParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Amount(raw) => write!(f, "could not parse amount: {raw:?}"),
            Self::Date(raw) => write!(f, "could not parse date: {raw:?}"),
        }
    }
}

/// Trim and drop an inline Notion link: `"Đi lại (https://www.notion.so/…)"` → `"Đi lại"`.
pub fn clean_text(value: Option<&str>) -> Option<String> {
    let mut text = value?.trim();
    if let Some(idx) = text.find('(') {
        text = text[..idx].trim();
    }
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

pub fn normalize_category(value: Option<String>, variants: &CategoryVariants) -> Option<String> {
    value.map(|v| variants.canonical(&v).to_string())
}

pub fn try_amount(value: Option<&str>) -> Result<f64, FieldParseWarning> {
    let Some(raw) = value else {
        return Ok(0.0);
    };
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace() && !CURRENCY_SYMBOLS.contains(c))
        .collect();
    if cleaned.is_empty() {
        return Ok(0.0);
    }
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(FieldParseWarning::Amount(raw.to_string())),
    }
}

/// Parse an amount, logging and counting anything unreadable as 0.
pub fn clean_amount(value: Option<&str>, warnings: &mut usize) -> f64 {
    try_amount(value).unwrap_or_else(|w| {
        warn!("{w}");
        *warnings += 1;
        0.0
    })
}

pub fn try_date(value: Option<&str>) -> Result<Option<NaiveDate>, FieldParseWarning> {
    let Some(raw) = value else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .map(Some)
        .ok_or_else(|| FieldParseWarning::Date(raw.to_string()))
}

/// Parse a date; an unreadable one is logged, counted and treated as missing.
pub fn parse_date(value: Option<&str>, warnings: &mut usize) -> Option<NaiveDate> {
    try_date(value).unwrap_or_else(|w| {
        warn!("{w}");
        *warnings += 1;
        None
    })
}
