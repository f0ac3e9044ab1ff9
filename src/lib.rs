//! Ingestion pipeline for auxiliary accounting ledger spreadsheets.
//!
//! Takes non-standard ledger exports (xlsx/xls/csv), decomposes the
//! 21-character hierarchical account code, computes running balances per
//! account section, and hands normalized transaction records to a
//! persistence sink in ordered chunks.

pub mod account_code;
pub mod balance;
pub mod columns;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod parser;
pub mod scanner;
pub mod settings;
pub mod sink;

pub use error::{LedgerError, Result};
pub use models::{
    AccountComponents, BatchManifest, BatchStatus, FileStatus, IngestWarning, TransactionRecord,
    WarningKind,
};
pub use orchestrator::{Orchestrator, SourceFile};
pub use parser::{parse_file, ParsedFile};
pub use settings::Settings;
pub use sink::{LogProgress, MemorySink, PersistenceSink, ProgressSink, SqliteSink};
