use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::batch::DEFAULT_BATCH_SIZE;
use crate::error::{MigrateError, Result};
use crate::normalize::CategoryVariants;

/// What to do with category/type values that have no lookup row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferencePolicy {
    /// Abort before any write.
    #[default]
    Strict,
    /// Warn and skip the affected rows.
    Tolerant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSettings {
    pub categories: String,
    pub types: String,
    pub expenses: String,
    pub id_column: String,
    pub name_column: String,
    pub owner_column: String,
    /// Run-audit table; `null` disables auditing.
    pub runs: Option<String>,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            categories: "categories".to_string(),
            types: "expense_types".to_string(),
            expenses: "expenses".to_string(),
            id_column: "id".to_string(),
            name_column: "name_vi".to_string(),
            owner_column: "user_id".to_string(),
            runs: Some("migration_runs".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: String,
    pub tables: TableSettings,
    pub category_variants: CategoryVariants,
    pub reference_policy: ReferencePolicy,
    pub batch_size: usize,
    pub write_retries: u32,
    pub retry_delay_ms: u64,
    pub currency_symbol: String,
    pub currency_decimals: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: default_database().to_string_lossy().to_string(),
            tables: TableSettings::default(),
            category_variants: CategoryVariants::default(),
            reference_policy: ReferencePolicy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            write_retries: 0,
            retry_delay_ms: 500,
            currency_symbol: "₫".to_string(),
            currency_decimals: 0,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(MigrateError::Settings("batch_size must be at least 1".into()));
        }
        if self.database.trim().is_empty() {
            return Err(MigrateError::Settings("database path is empty".into()));
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(shellexpand_path(&self.database))
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("expense-migrate")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_database() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("expense-migrate")
        .join("expenses.db")
}

/// Missing file means defaults; a file that exists but does not parse is an error.
pub fn load_settings(path: &Path) -> Result<Settings> {
    let settings = if path.exists() {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| MigrateError::Settings(format!("{}: {e}", path.display())))?
    } else {
        Settings::default()
    };
    settings.validate()?;
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| MigrateError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
