pub mod init;
pub mod migrate;
pub mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;
use crate::settings::{load_settings, settings_path, Settings};

#[derive(Parser)]
#[command(
    name = "expense-migrate",
    version,
    about = "Migrate a Notion expense export into the expense ledger."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (default: ~/.config/expense-migrate/settings.json)
    #[arg(long, global = true, env = "EXPENSE_MIGRATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Destination database, overrides `database` in settings
    #[arg(long, global = true, env = "EXPENSE_MIGRATE_DB")]
    pub db: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a Notion CSV export into the expenses table.
    Migrate {
        /// Path to the Notion CSV export
        #[arg(long)]
        csv: PathBuf,
        /// Owner UUID the expenses belong to
        #[arg(long = "user-id")]
        user_id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Stop after validation and transformation; write nothing
        #[arg(long)]
        dry_run: bool,
        /// Skip rows with unknown categories/types instead of aborting
        #[arg(long)]
        tolerant: bool,
    },
    /// Create the destination database with default categories and types.
    Init,
    /// Show lookup tables, expense counts and recent migration runs.
    Status {
        /// Limit counts and runs to one owner
        #[arg(long = "user-id")]
        user_id: Option<String>,
    },
}

impl Cli {
    pub fn settings_file(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(settings_path)
    }

    /// Settings from disk with command-line overrides applied.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = load_settings(&self.settings_file())?;
        if let Some(db) = &self.db {
            settings.database = db.to_string_lossy().to_string();
        }
        settings.validate()?;
        Ok(settings)
    }
}
