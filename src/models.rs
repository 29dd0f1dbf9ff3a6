use chrono::NaiveDate;
use rust_decimal::Decimal;

/// A single cell value as it arrived from the export.
///
/// CSV cells are always text; workbook cells may already be numeric.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Empty,
    Text(String),
    Number(f64),
}

impl RawValue {
    pub fn from_text(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s.to_string())
        }
    }

    pub fn display(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
        }
    }
}

/// The amount cell(s) of a ledger row, depending on the export vintage.
#[derive(Debug, Clone, PartialEq)]
pub enum RawAmount {
    Single(RawValue),
    Split { debit: RawValue, credit: RawValue },
}

/// One row of the ledger export, exactly as tabulated.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLedgerRow {
    /// 1-based physical line (or sheet row) in the source file.
    pub line: usize,
    pub date: String,
    pub source: String,
    pub amount: RawAmount,
    /// Every other column, in header order.
    pub fields: Vec<(String, String)>,
}

impl RawLedgerRow {
    /// Comma-joined rendering of the row for error messages.
    pub fn raw(&self) -> String {
        let mut parts = vec![self.date.clone(), self.source.clone()];
        match &self.amount {
            RawAmount::Single(v) => parts.push(v.display()),
            RawAmount::Split { debit, credit } => {
                parts.push(debit.display());
                parts.push(credit.display());
            }
        }
        parts.extend(self.fields.iter().map(|(_, v)| v.clone()));
        parts.join(", ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Revenue,
    Cost,
}

impl Kind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Revenue => "Revenue",
            Self::Cost => "Cost",
        }
    }
}

/// A normalized statement transaction.
///
/// Created by the importer with `category_raw` and `amount`; `category_major`,
/// `kind`, `revenue` and `cost` are filled in by the categorizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub line: usize,
    pub date: NaiveDate,
    pub source: String,
    /// Signed, positive = money in. `None` when the amount cell was empty.
    pub amount: Option<Decimal>,
    pub category_raw: String,
    pub category_major: String,
    pub kind: Option<Kind>,
    pub revenue: Decimal,
    pub cost: Decimal,
    /// Set when the row was reclassified in a way worth a manual look.
    pub review: Option<String>,
    pub fields: Vec<(String, String)>,
}

/// Bookkeeping for one upload to the record store.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRecord {
    pub filename: String,
    pub collection: String,
    pub checksum: String,
    pub record_count: usize,
    pub date_range_start: Option<NaiveDate>,
    pub date_range_end: Option<NaiveDate>,
}

impl ImportRecord {
    pub fn new(filename: &str, collection: &str, checksum: String, txns: &[Transaction]) -> Self {
        Self {
            filename: filename.to_string(),
            collection: collection.to_string(),
            checksum,
            record_count: txns.len(),
            date_range_start: txns.iter().map(|t| t.date).min(),
            date_range_end: txns.iter().map(|t| t.date).max(),
        }
    }
}
