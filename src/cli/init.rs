use std::path::PathBuf;

use crate::db::SqliteStore;
use crate::error::Result;
use crate::settings::{load_settings, save_settings, settings_path, shellexpand_path};

pub fn run(data_dir: Option<String>) -> Result<()> {
    let mut settings = load_settings()?;
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }

    let data_path = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&data_path)?;
    SqliteStore::open(&settings.db_path())?;
    save_settings(&settings)?;

    println!("Initialized kpi-ledger at {}", data_path.display());
    println!("Settings:  {}", settings_path().display());
    println!("Profile:   {}", settings.default_profile);
    Ok(())
}
