use crate::db::SqliteStore;
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::settings::{load_settings, settings_path};

pub fn run() -> Result<()> {
    let settings = load_settings()?;
    let db_path = settings.db_path();

    println!("Settings:   {}", settings_path().display());
    println!("Data dir:   {}", settings.data_dir);
    println!("Profile:    {}", settings.default_profile);
    println!("Collection: {}", settings.collection);
    println!("Database:   {}", db_path.display());

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `kpi-ledger init` to set up.");
        return Ok(());
    }

    let size = std::fs::metadata(&db_path)?.len();
    println!("DB size:    {}", format_bytes(size));

    let store = SqliteStore::open(&db_path)?;
    println!();
    let counts = store.collection_counts()?;
    if counts.is_empty() {
        println!("No records uploaded yet.");
    }
    for (collection, count) in counts {
        println!("{collection}: {count} records");
    }

    if let Some(last) = store.last_import()? {
        println!();
        println!("Last upload: {} -> {:?} at {}", last.filename, last.collection, last.import_date);
        if let (Some(start), Some(end)) = (&last.date_range_start, &last.date_range_end) {
            println!("  {} records, {start} to {end}", last.record_count);
        }
    }
    Ok(())
}
