use std::path::PathBuf;

use thiserror::Error;

use crate::validator::UnresolvedReferences;

#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("Cannot reach destination: {0}\nCheck the --db path (or `database` in settings) and run `expense-migrate init` for a fresh database.")]
    Connectivity(String),

    #[error("Input file not found: {}\nExpected path: {}", .path.display(), .resolved.display())]
    NotFound { path: PathBuf, resolved: PathBuf },

    #[error("Invalid owner identifier '{0}'\nExpected format: xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx (lowercase hex)")]
    MalformedInput(String),

    #[error("Export is missing required column(s): {}\nRe-export from Notion with the Name, Amount, Category, Type and Date properties visible.", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Validation failed:\n{0}")]
    Validation(UnresolvedReferences),

    #[error("Migration cancelled by user")]
    Cancelled,

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Destination error: {0}")]
    Destination(String),

    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, MigrateError>;
