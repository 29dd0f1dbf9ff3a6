use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("Missing column in statement header: {0}")]
    MissingColumn(String),

    #[error("Malformed amount {value:?} on line {line}: {row}")]
    MalformedAmount {
        line: usize,
        value: String,
        row: String,
    },

    #[error("Malformed date {value:?} on line {line}")]
    MalformedDate { line: usize, value: String },

    #[error("Transaction on line {line} appears before any category header: {row}")]
    UncategorizedTransaction { line: usize, row: String },

    #[error("Transaction on line {line} ({description}) has no amount to classify")]
    MissingAmount { line: usize, description: String },

    #[error("Record store unavailable: {0}")]
    SinkUnavailable(String),

    #[error("Unknown statement profile: {0}")]
    UnknownProfile(String),

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("Settings error: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
