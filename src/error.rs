use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("Malformed account code (expected 21 characters, got {length}): {code}")]
    MalformedAccountCode { code: String, length: usize },

    #[error("Unrecognized ledger format: no account sections found in {0}")]
    UnrecognizedFormat(String),

    #[error("Unsupported file extension: {0}")]
    UnsupportedExtension(String),

    #[error("File too large: {name} ({size_mb} MB, limit {limit_mb} MB)")]
    FileTooLarge {
        name: String,
        size_mb: u64,
        limit_mb: u64,
    },

    #[error("Empty batch: no files provided")]
    EmptyBatch,

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
