use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};

use crate::error::{LedgerError, Result};
use crate::models::{ImportRecord, Transaction};

const NULL_MARKERS: &[&str] = &["None", "nan", "NaN", "null"];

/// Placeholders left behind by spreadsheet round-trips become empty text.
pub fn normalize_text(value: &str) -> String {
    let value = value.trim();
    if NULL_MARKERS.contains(&value) {
        String::new()
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(Decimal),
}

impl FieldValue {
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(d) => d.to_string(),
        }
    }

    /// Numbers keep their decimal text, e.g. `12500.00`.
    fn to_json(&self) -> Result<Value> {
        Ok(match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::Number(d) => Value::Number(Number::from_str(&d.to_string())?),
        })
    }
}

/// One output row; values line up with `ExportTable::columns`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub values: Vec<FieldValue>,
}

/// The flat, ordered table handed to files and record stores.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportTable {
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl ExportTable {
    pub fn from_transactions(txns: &[Transaction]) -> Self {
        let mut passthrough: Vec<String> = Vec::new();
        for txn in txns {
            for (name, _) in &txn.fields {
                if !passthrough.contains(name) {
                    passthrough.push(name.clone());
                }
            }
        }

        let mut columns = vec!["Date".to_string(), "Source".to_string()];
        columns.extend(passthrough.iter().cloned());
        columns.extend(
            ["Category", "Category Major", "Kind", "Revenue", "Cost"]
                .iter()
                .map(|c| c.to_string()),
        );

        let records = txns
            .iter()
            .map(|txn| {
                let mut values = vec![
                    FieldValue::Text(txn.date.format("%Y-%m-%d").to_string()),
                    FieldValue::Text(normalize_text(&txn.source)),
                ];
                for name in &passthrough {
                    let value = txn
                        .fields
                        .iter()
                        .find(|(n, _)| n == name)
                        .map(|(_, v)| normalize_text(v))
                        .unwrap_or_default();
                    values.push(FieldValue::Text(value));
                }
                values.push(FieldValue::Text(normalize_text(&txn.category_raw)));
                values.push(FieldValue::Text(normalize_text(&txn.category_major)));
                values.push(FieldValue::Text(
                    txn.kind.map(|k| k.label().to_string()).unwrap_or_default(),
                ));
                values.push(FieldValue::Number(txn.revenue));
                values.push(FieldValue::Number(txn.cost));
                Record { values }
            })
            .collect();

        Self { columns, records }
    }

    /// One record as a JSON object with keys in column order.
    pub fn record_json(&self, record: &Record) -> Result<Map<String, Value>> {
        let mut object = Map::with_capacity(self.columns.len());
        for (name, value) in self.columns.iter().zip(&record.values) {
            object.insert(name.clone(), value.to_json()?);
        }
        Ok(object)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn from_key(key: &str) -> Result<Self> {
        match key.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(LedgerError::UnknownFormat(other.to_string())),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

pub fn write_csv<W: Write>(writer: W, table: &ExportTable) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(&table.columns)?;
    for record in &table.records {
        wtr.write_record(record.values.iter().map(FieldValue::as_text))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<W: Write>(mut writer: W, table: &ExportTable) -> Result<()> {
    let records = table
        .records
        .iter()
        .map(|r| table.record_json(r).map(Value::Object))
        .collect::<Result<Vec<_>>>()?;
    serde_json::to_writer_pretty(&mut writer, &records)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// `statement.csv` becomes `statement-cleaned.<ext>` in the same directory.
pub fn default_output_path(input: &Path, format: ExportFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "statement".to_string());
    input.with_file_name(format!("{stem}-cleaned.{}", format.extension()))
}

/// Write the table to `path`, replacing any previous file only once the new
/// content is complete.
pub fn write_file(path: &Path, table: &ExportTable, format: ExportFormat) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension(format!("{}.tmp", format.extension()));
    {
        let file = std::fs::File::create(&tmp)?;
        let writer = std::io::BufWriter::new(file);
        let written = match format {
            ExportFormat::Csv => write_csv(writer, table),
            ExportFormat::Json => write_json(writer, table),
        };
        if let Err(e) = written {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
    }
    std::fs::rename(&tmp, path)?;
    log::info!("wrote {} records to {}", table.records.len(), path.display());
    Ok(())
}

/// A destination that is cleared and wholly re-populated on every run.
pub trait RecordSink {
    /// Delete every record in `collection` and insert `table` in order.
    /// Implementations must leave the previous contents in place on failure.
    fn replace_all(&mut self, collection: &str, table: &ExportTable) -> Result<usize>;

    /// Replace `import.collection` and log the upload as one unit. Sinks
    /// without an import log just replace.
    fn upload(&mut self, table: &ExportTable, import: &ImportRecord) -> Result<usize> {
        self.replace_all(&import.collection, table)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::Kind;

    fn txn(line: usize, source: &str, kind: Kind, revenue: &str, cost: &str) -> Transaction {
        Transaction {
            line,
            date: NaiveDate::from_ymd_opt(2023, 1, line as u32).unwrap(),
            source: source.to_string(),
            amount: None,
            category_raw: "4000 Service Revenue: GESIS".to_string(),
            category_major: "GESIS".to_string(),
            kind: Some(kind),
            revenue: Decimal::from_str(revenue).unwrap(),
            cost: Decimal::from_str(cost).unwrap(),
            review: None,
            fields: vec![
                ("Reference".to_string(), "INV-1".to_string()),
                ("Invoice Number".to_string(), "None".to_string()),
            ],
        }
    }

    fn table() -> ExportTable {
        ExportTable::from_transactions(&[
            txn(5, "Receivable Invoice", Kind::Revenue, "12500.00", "0"),
            txn(6, "Payable Invoice", Kind::Cost, "0", "1234.56"),
        ])
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("None"), "");
        assert_eq!(normalize_text("nan"), "");
        assert_eq!(normalize_text("  "), "");
        assert_eq!(normalize_text(" INV-1 "), "INV-1");
        assert_eq!(normalize_text("Nonetheless"), "Nonetheless");
    }

    #[test]
    fn test_columns_are_stable() {
        let t = table();
        assert_eq!(
            t.columns,
            vec![
                "Date", "Source", "Reference", "Invoice Number", "Category",
                "Category Major", "Kind", "Revenue", "Cost"
            ]
        );
        assert_eq!(t.records.len(), 2);
    }

    #[test]
    fn test_write_csv() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &table()).unwrap();
        let out = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines[0],
            "Date,Source,Reference,Invoice Number,Category,Category Major,Kind,Revenue,Cost"
        );
        assert_eq!(
            lines[1],
            "2023-01-05,Receivable Invoice,INV-1,,4000 Service Revenue: GESIS,GESIS,Revenue,12500.00,0"
        );
        assert_eq!(lines[2].split(',').last(), Some("1234.56"));
    }

    #[test]
    fn test_write_json_keeps_column_order() {
        let mut buf = Vec::new();
        write_json(&mut buf, &table()).unwrap();
        let out = String::from_utf8(buf).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
        assert_eq!(parsed[0]["Kind"], "Revenue");
        assert_eq!(parsed[1]["Cost"].as_f64(), Some(1234.56));
        assert!(out.find("\"Date\"").unwrap() < out.find("\"Cost\"").unwrap());
        assert!(out.contains("\"Revenue\": 12500.00"));
    }

    #[test]
    fn test_record_json_keeps_column_order() {
        let t = table();
        let object = t.record_json(&t.records[1]).unwrap();
        let keys: Vec<&String> = object.keys().collect();
        assert_eq!(keys, t.columns.iter().collect::<Vec<_>>());
        assert_eq!(object["Invoice Number"], Value::String(String::new()));
        assert_eq!(object["Cost"].to_string(), "1234.56");
    }

    #[test]
    fn test_write_file_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("stmt-cleaned.csv");
        write_file(&path, &table(), ExportFormat::Csv).unwrap();
        let first = std::fs::read(&path).unwrap();
        write_file(&path, &table(), ExportFormat::Csv).unwrap();
        assert_eq!(first, std::fs::read(&path).unwrap());
        assert!(!path.with_extension("csv.tmp").exists());
    }

    #[test]
    fn test_default_output_path() {
        let p = default_output_path(Path::new("data/css-accounting.csv"), ExportFormat::Csv);
        assert_eq!(p, PathBuf::from("data/css-accounting-cleaned.csv"));
        let p = default_output_path(Path::new("stmt.xlsx"), ExportFormat::Json);
        assert_eq!(p, PathBuf::from("stmt-cleaned.json"));
    }

    #[test]
    fn test_export_format_keys() {
        assert_eq!(ExportFormat::from_key("CSV").unwrap(), ExportFormat::Csv);
        assert!(matches!(
            ExportFormat::from_key("parquet"),
            Err(LedgerError::UnknownFormat(_))
        ));
    }

    struct VecSink(Vec<(String, usize)>);

    impl RecordSink for VecSink {
        fn replace_all(&mut self, collection: &str, table: &ExportTable) -> Result<usize> {
            self.0.retain(|(c, _)| c != collection);
            self.0.push((collection.to_string(), table.records.len()));
            Ok(table.records.len())
        }
    }

    #[test]
    fn test_sink_replaces_collection() {
        let mut sink = VecSink(Vec::new());
        sink.replace_all("Ledger", &table()).unwrap();
        sink.replace_all("Ledger", &table()).unwrap();
        assert_eq!(sink.0, vec![("Ledger".to_string(), 2)]);
    }

    #[test]
    fn test_default_upload_replaces_import_collection() {
        let mut sink = VecSink(Vec::new());
        let import = ImportRecord::new("stmt.csv", "Archive", "abc".to_string(), &[]);
        assert_eq!(sink.upload(&table(), &import).unwrap(), 2);
        assert_eq!(sink.0, vec![("Archive".to_string(), 2)]);
    }
}
