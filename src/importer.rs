use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::categorizer::Categorizer;
use crate::error::{LedgerError, Result};
use crate::models::{RawAmount, RawLedgerRow, RawValue, Transaction};
use crate::settings::{AmountColumns, StatementProfile};

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£'];

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse an amount in accounting notation: thousands separators, a leading
/// currency symbol and parenthesized negatives. Returns `None` when the text
/// does not match the grammar. Callers handle empty cells before this.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    if raw.contains('_') {
        return None;
    }
    let cleaned = raw.replace(',', "");
    let mut s = cleaned.trim();
    let mut negative = false;

    // "$(1,234.56)" carries the symbol outside the parentheses.
    if let Some(rest) = s.strip_prefix(CURRENCY_SYMBOLS) {
        if rest.trim_start().starts_with('(') {
            s = rest.trim_start();
        }
    }
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        negative = true;
        s = inner.trim();
    }
    if let Some(rest) = s.strip_prefix('-') {
        negative = !negative;
        s = rest.trim_start();
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest.trim_start();
    }
    s = s.strip_prefix(CURRENCY_SYMBOLS).unwrap_or(s).trim_start();

    if s.is_empty() || !s.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let value = Decimal::from_str(s).ok()?;
    Some(if negative { negate(value) } else { value })
}

/// Negation that never produces a signed zero.
pub fn negate(value: Decimal) -> Decimal {
    if value.is_zero() {
        Decimal::ZERO
    } else {
        -value
    }
}

fn value_amount(value: &RawValue) -> std::result::Result<Option<Decimal>, String> {
    match value {
        RawValue::Empty => Ok(None),
        RawValue::Number(n) => Decimal::from_f64(*n)
            .map(|d| Some(d.normalize()))
            .ok_or_else(|| n.to_string()),
        RawValue::Text(s) => parse_amount(s).map(Some).ok_or_else(|| s.clone()),
    }
}

/// Resolve the signed amount of a row. `Ok(None)` means the cell was absent.
pub fn row_amount(row: &RawLedgerRow) -> Result<Option<Decimal>> {
    let malformed = |value: String| LedgerError::MalformedAmount {
        line: row.line,
        value,
        row: row.raw(),
    };
    match &row.amount {
        RawAmount::Single(v) => value_amount(v).map_err(malformed),
        RawAmount::Split { debit, credit } => {
            let debit = value_amount(debit).map_err(malformed)?;
            let credit = value_amount(credit).map_err(malformed)?;
            match (debit, credit) {
                (None, None) => Ok(None),
                (d, c) => Ok(Some(c.unwrap_or_default() - d.unwrap_or_default())),
            }
        }
    }
}

pub fn parse_date(raw: &str, formats: &[String]) -> Option<NaiveDate> {
    let raw = raw.trim();
    for fmt in formats {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d);
        }
    }
    // Spreadsheet tools like to append a midnight time component.
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.date())
}

/// Largest serial Excel itself accepts (9999-12-31).
#[cfg(any(feature = "xlsx", test))]
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

/// `None` for serials outside the range a spreadsheet can hold.
#[cfg(any(feature = "xlsx", test))]
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(0.0..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(chrono::Duration::try_days(serial as i64)?)
}

pub fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

/// Byte offset just past the first `n` lines of `content`.
fn skip_lines(content: &str, n: usize) -> &str {
    if n == 0 {
        return content;
    }
    match content.match_indices('\n').nth(n - 1) {
        Some((idx, _)) => &content[idx + 1..],
        None => "",
    }
}

// ---------------------------------------------------------------------------
// Column layout
// ---------------------------------------------------------------------------

enum AmountIndex {
    Single(usize),
    Split { debit: usize, credit: usize },
}

struct Columns {
    date: usize,
    source: usize,
    amount: AmountIndex,
    passthrough: Vec<(usize, String)>,
}

impl Columns {
    fn resolve(headers: &[String], profile: &StatementProfile) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| LedgerError::MissingColumn(name.to_string()))
        };
        let date = find(profile.date_column.as_str())?;
        let source = find(profile.source_column.as_str())?;
        let amount = match &profile.amount {
            AmountColumns::Net { column } => AmountIndex::Single(find(column.as_str())?),
            AmountColumns::DebitCredit { debit, credit } => AmountIndex::Split {
                debit: find(debit.as_str())?,
                credit: find(credit.as_str())?,
            },
        };

        let mut consumed = vec![date, source];
        match amount {
            AmountIndex::Single(i) => consumed.push(i),
            AmountIndex::Split { debit, credit } => consumed.extend([debit, credit]),
        }
        let passthrough = headers
            .iter()
            .enumerate()
            .filter(|(i, h)| {
                !consumed.contains(i) && !h.is_empty() && !profile.drop_columns.contains(*h)
            })
            .map(|(i, h)| (i, h.clone()))
            .collect();

        Ok(Self {
            date,
            source,
            amount,
            passthrough,
        })
    }

    fn build(
        &self,
        line: usize,
        text: impl Fn(usize) -> String,
        value: impl Fn(usize) -> RawValue,
    ) -> RawLedgerRow {
        let amount = match self.amount {
            AmountIndex::Single(i) => RawAmount::Single(value(i)),
            AmountIndex::Split { debit, credit } => RawAmount::Split {
                debit: value(debit),
                credit: value(credit),
            },
        };
        RawLedgerRow {
            line,
            date: text(self.date),
            source: text(self.source),
            amount,
            fields: self
                .passthrough
                .iter()
                .map(|(i, name)| (name.clone(), text(*i)))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Readers
// ---------------------------------------------------------------------------

fn is_workbook(file_path: &Path) -> bool {
    file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| ["xlsx", "xlsm", "xls", "ods"].iter().any(|w| e.eq_ignore_ascii_case(w)))
        .unwrap_or(false)
}

/// Read the raw rows of a ledger export, CSV or workbook by file extension.
pub fn read_rows(file_path: &Path, profile: &StatementProfile) -> Result<Vec<RawLedgerRow>> {
    if is_workbook(file_path) {
        return read_workbook_rows(file_path, profile);
    }
    let file = std::fs::File::open(file_path)?;
    read_csv_rows(std::io::BufReader::new(file), profile)
}

pub fn read_csv_rows<R: Read>(mut reader: R, profile: &StatementProfile) -> Result<Vec<RawLedgerRow>> {
    let mut content = String::new();
    reader.read_to_string(&mut content)?;
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
    let body = skip_lines(content, profile.banner_lines);

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let columns = Columns::resolve(&headers, profile)?;

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let line = profile.banner_lines
            + record.position().map(|p| p.line() as usize).unwrap_or(0);
        let text = |i: usize| record.get(i).unwrap_or("").trim().to_string();
        let value = |i: usize| RawValue::from_text(record.get(i).unwrap_or(""));
        rows.push(columns.build(line, text, value));
    }
    log::debug!("read {} csv rows", rows.len());
    Ok(rows)
}

#[cfg(feature = "xlsx")]
fn read_workbook_rows(file_path: &Path, profile: &StatementProfile) -> Result<Vec<RawLedgerRow>> {
    use calamine::{Data, Reader};

    fn text(cell: Option<&Data>) -> String {
        match cell {
            Some(Data::String(s)) | Some(Data::DateTimeIso(s)) => s.trim().to_string(),
            Some(Data::Int(i)) => i.to_string(),
            Some(Data::Float(f)) if f.fract() == 0.0 && f.abs() < 1e15 => (*f as i64).to_string(),
            Some(Data::Float(f)) => f.to_string(),
            Some(Data::Bool(b)) => b.to_string(),
            Some(Data::DateTime(dt)) => serial_text(dt.as_f64()),
            _ => String::new(),
        }
    }

    // Out-of-range serials keep their digits so the row fails as a bad date.
    fn serial_text(serial: f64) -> String {
        excel_serial_to_date(serial)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| serial.to_string())
    }

    fn date_text(cell: Option<&Data>) -> String {
        match cell {
            Some(Data::Float(f)) => serial_text(*f),
            Some(Data::Int(i)) => serial_text(*i as f64),
            other => text(other),
        }
    }

    fn value(cell: Option<&Data>) -> RawValue {
        match cell {
            Some(Data::Float(f)) => RawValue::Number(*f),
            Some(Data::Int(i)) => RawValue::Number(*i as f64),
            Some(Data::String(s)) => RawValue::from_text(s),
            _ => RawValue::Empty,
        }
    }

    let mut workbook = calamine::open_workbook_auto(file_path)
        .map_err(|e| LedgerError::Workbook(format!("failed to open {}: {e}", file_path.display())))?;
    let sheet = match &profile.sheet {
        Some(name) => name.clone(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| LedgerError::Workbook("workbook has no sheets".to_string()))?,
    };
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| LedgerError::Workbook(format!("sheet {sheet}: {e}")))?;

    let first_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);
    let mut columns: Option<Columns> = None;
    let mut rows = Vec::new();

    for (i, cells) in range.rows().enumerate() {
        let absolute = first_row + i;
        if absolute < profile.banner_lines {
            continue;
        }
        let Some(cols) = &columns else {
            if absolute > profile.banner_lines {
                // Header row itself was empty and got trimmed from the range.
                break;
            }
            let headers: Vec<String> = cells.iter().map(|c| text(Some(c))).collect();
            columns = Some(Columns::resolve(&headers, profile)?);
            continue;
        };
        let date_col = cols.date;
        rows.push(cols.build(
            absolute + 1,
            |c| {
                if c == date_col {
                    date_text(cells.get(c))
                } else {
                    text(cells.get(c))
                }
            },
            |c| value(cells.get(c)),
        ));
    }

    if columns.is_none() {
        return Err(LedgerError::MissingColumn(profile.date_column.clone()));
    }
    log::debug!("read {} rows from sheet {sheet}", rows.len());
    Ok(rows)
}

#[cfg(not(feature = "xlsx"))]
fn read_workbook_rows(file_path: &Path, _profile: &StatementProfile) -> Result<Vec<RawLedgerRow>> {
    Err(LedgerError::UnknownFormat(format!(
        "{} (built without workbook support)",
        file_path.display()
    )))
}

// ---------------------------------------------------------------------------
// Statement parsing
// ---------------------------------------------------------------------------

/// Turn raw ledger rows into transactions in a single pass.
///
/// Rows whose date is empty or starts with "Total" are dropped. A row with an
/// empty source is a category header and becomes the active category for the
/// rows that follow. Every other row is a transaction.
pub fn parse_statement(rows: &[RawLedgerRow], profile: &StatementProfile) -> Result<Vec<Transaction>> {
    let mut active_category: Option<&str> = None;
    let mut out = Vec::new();

    for row in rows {
        let date = row.date.trim();
        if date.is_empty() || date.starts_with("Total") {
            log::debug!("line {}: dropped {:?}", row.line, date);
            continue;
        }
        if row.source.trim().is_empty() {
            log::debug!("line {}: category {:?}", row.line, date);
            active_category = Some(date);
            continue;
        }

        let Some(category) = active_category else {
            return Err(LedgerError::UncategorizedTransaction {
                line: row.line,
                row: row.raw(),
            });
        };
        let amount = row_amount(row)?;
        let date = parse_date(date, &profile.date_formats).ok_or_else(|| {
            LedgerError::MalformedDate {
                line: row.line,
                value: date.to_string(),
            }
        })?;

        out.push(Transaction {
            line: row.line,
            date,
            source: row.source.trim().to_string(),
            amount,
            category_raw: category.to_string(),
            category_major: String::new(),
            kind: None,
            revenue: Decimal::ZERO,
            cost: Decimal::ZERO,
            review: None,
            fields: row.fields.clone(),
        });
    }

    Ok(out)
}

/// Read, parse and categorize a whole statement file. Nothing is returned
/// unless every row passes.
pub fn load_statement(file_path: &Path, profile: &StatementProfile) -> Result<Vec<Transaction>> {
    let rows = read_rows(file_path, profile)?;
    let mut transactions = parse_statement(&rows, profile)?;
    Categorizer::new(profile)?.categorize_all(&mut transactions)?;
    log::info!(
        "{}: {} rows read, {} transactions",
        file_path.display(),
        rows.len(),
        transactions.len()
    );
    Ok(transactions)
}
