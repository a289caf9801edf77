use std::path::Path;

use crate::destination::sqlite::SqliteDestination;
use crate::destination::{Destination, Filter};
use crate::error::Result;
use crate::settings::{save_settings, Settings};

pub fn run(settings: &Settings, settings_file: &Path) -> Result<()> {
    let db_path = settings.database_path();
    let dest = SqliteDestination::create(&db_path, &settings.tables)?;

    if !settings_file.exists() {
        save_settings(settings_file, settings)?;
        println!("Wrote settings to {}", settings_file.display());
    }

    let categories = dest.count(&settings.tables.categories, &Filter::all())?;
    let types = dest.count(&settings.tables.types, &Filter::all())?;
    println!("Initialized destination at {}", db_path.display());
    println!("  Categories:    {categories}");
    println!("  Expense types: {types}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_creates_db_and_settings() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            database: dir.path().join("data").join("expenses.db").to_string_lossy().to_string(),
            ..Settings::default()
        };
        let settings_file = dir.path().join("settings.json");
        run(&settings, &settings_file).unwrap();
        assert!(dir.path().join("data").join("expenses.db").exists());
        assert!(settings_file.exists());

        // A second init keeps the existing settings file and lookups.
        std::fs::write(&settings_file, "{}").unwrap();
        run(&settings, &settings_file).unwrap();
        assert_eq!(std::fs::read_to_string(&settings_file).unwrap(), "{}");
    }
}
