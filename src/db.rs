use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{LedgerError, Result};
use crate::exporter::{ExportTable, RecordSink};
use crate::models::ImportRecord;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY,
    collection TEXT NOT NULL,
    position INTEGER NOT NULL,
    fields TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection, position);

CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    collection TEXT NOT NULL,
    import_date TEXT DEFAULT (datetime('now')),
    record_count INTEGER,
    date_range_start TEXT,
    date_range_end TEXT,
    checksum TEXT
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// A previous upload, as listed by `status`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSummary {
    pub filename: String,
    pub collection: String,
    pub import_date: String,
    pub record_count: i64,
    pub date_range_start: Option<String>,
    pub date_range_end: Option<String>,
}

/// Record store backed by a local SQLite database. Each collection is
/// replaced wholesale inside a single transaction.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(dir) = db_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let conn = get_connection(db_path)
            .map_err(|e| LedgerError::SinkUnavailable(format!("{}: {e}", db_path.display())))?;
        init_db(&conn)?;
        Ok(Self { conn })
    }

    pub fn collection_counts(&self) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT collection, count(*) FROM records GROUP BY collection ORDER BY collection",
        )?;
        let rows = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn last_import(&self) -> Result<Option<ImportSummary>> {
        let summary = self
            .conn
            .query_row(
                "SELECT filename, collection, import_date, record_count, date_range_start, date_range_end
                 FROM imports ORDER BY id DESC LIMIT 1",
                [],
                |r| {
                    Ok(ImportSummary {
                        filename: r.get(0)?,
                        collection: r.get(1)?,
                        import_date: r.get(2)?,
                        record_count: r.get(3)?,
                        date_range_start: r.get(4)?,
                        date_range_end: r.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(summary)
    }

    fn replace(
        &mut self,
        collection: &str,
        table: &ExportTable,
        import: Option<&ImportRecord>,
    ) -> Result<usize> {
        let rows = table
            .records
            .iter()
            .map(|r| Ok(serde_json::to_string(&table.record_json(r)?)?))
            .collect::<Result<Vec<_>>>()?;
        self.replace_collection(collection, &rows, import)
            .map_err(|e| LedgerError::SinkUnavailable(format!("{collection}: {e}")))?;
        log::info!("replaced {collection:?} with {} records", rows.len());
        Ok(rows.len())
    }

    fn replace_collection(
        &mut self,
        collection: &str,
        rows: &[String],
        import: Option<&ImportRecord>,
    ) -> rusqlite::Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM records WHERE collection = ?1", params![collection])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO records (collection, position, fields) VALUES (?1, ?2, ?3)",
            )?;
            for (position, fields) in rows.iter().enumerate() {
                stmt.execute(params![collection, position as i64, fields])?;
            }
        }
        if let Some(import) = import {
            insert_import(&tx, import)?;
        }
        tx.commit()
    }
}

fn insert_import(conn: &Connection, import: &ImportRecord) -> rusqlite::Result<()> {
    let fmt = |d: Option<NaiveDate>| d.map(|d| d.format("%Y-%m-%d").to_string());
    conn.execute(
        "INSERT INTO imports (filename, collection, record_count, date_range_start, date_range_end, checksum)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            import.filename,
            import.collection,
            import.record_count as i64,
            fmt(import.date_range_start),
            fmt(import.date_range_end),
            import.checksum,
        ],
    )?;
    Ok(())
}

impl RecordSink for SqliteStore {
    fn replace_all(&mut self, collection: &str, table: &ExportTable) -> Result<usize> {
        self.replace(collection, table, None)
    }

    fn upload(&mut self, table: &ExportTable, import: &ImportRecord) -> Result<usize> {
        self.replace(&import.collection, table, Some(import))
    }
}
