use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::db::SqliteStore;
use crate::error::Result;
use crate::exporter::{default_output_path, write_file, ExportFormat, ExportTable, RecordSink};
use crate::importer::{compute_checksum, load_statement};
use crate::models::{ImportRecord, Transaction};
use crate::reports::date_range;
use crate::settings::load_settings;

pub struct NormalizeArgs {
    pub file: String,
    pub profile: Option<String>,
    pub output: Option<String>,
    pub format: String,
    pub upload: bool,
    pub collection: Option<String>,
}

pub fn run(args: NormalizeArgs) -> Result<()> {
    let settings = load_settings()?;
    let profile = settings.profile(args.profile.as_deref())?;
    let format = ExportFormat::from_key(&args.format)?;
    let file_path = PathBuf::from(&args.file);

    // Nothing is written unless the whole statement parses and categorizes.
    let txns = load_statement(&file_path, &profile)?;
    let table = ExportTable::from_transactions(&txns);

    let output = args
        .output
        .map(PathBuf::from)
        .unwrap_or_else(|| default_output_path(&file_path, format));
    write_file(&output, &table, format)?;

    match date_range(&txns) {
        Some((first, last)) => println!(
            "{} transactions ({first} to {last}) written to {}",
            txns.len(),
            output.display()
        ),
        None => println!("0 transactions written to {}", output.display()),
    }

    if args.upload {
        let collection = args.collection.unwrap_or_else(|| settings.collection.clone());
        upload(&settings.db_path(), &file_path, &collection, &table, &txns)?;
    }

    let flagged: Vec<_> = txns.iter().filter(|t| t.review.is_some()).collect();
    if !flagged.is_empty() {
        println!("{}", format!("{} flagged for review:", flagged.len()).yellow().bold());
        for t in flagged {
            println!(
                "  line {}: {} {} ({})",
                t.line,
                t.date,
                t.source,
                t.review.as_deref().unwrap_or_default()
            );
        }
    }
    Ok(())
}

fn upload(
    db_path: &Path,
    file_path: &Path,
    collection: &str,
    table: &ExportTable,
    txns: &[Transaction],
) -> Result<()> {
    let checksum = compute_checksum(file_path)?;
    let filename = file_path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_default();
    let import = ImportRecord::new(&filename, collection, checksum, txns);
    let mut store = SqliteStore::open(db_path)?;
    let count = store.upload(table, &import)?;
    println!("{count} records uploaded to {collection:?}");
    Ok(())
}
