use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One spreadsheet cell, decoupled from the source format so xlsx ranges
/// and csv records feed the same scanner.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    /// Cell content as display text, trimmed. Empty cells yield "".
    pub fn text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => {
                if n.fract() == 0.0 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
        }
    }
}

/// The 13 positional components of a 21-character account code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountComponents {
    pub genero: String,
    pub grupo: String,
    pub rubro: String,
    pub cuenta: String,
    pub subcuenta: String,
    pub dependencia: String,
    pub unidad_responsable: String,
    pub centro_costo: String,
    pub proyecto_presupuestario: String,
    pub fuente: String,
    pub subfuente: String,
    pub tipo_recurso: String,
    pub partida_presupuestal: String,
}

impl AccountComponents {
    /// Reassembles the full code by concatenating components in position
    /// order. Inverse of `account_code::decompose`.
    pub fn concat(&self) -> String {
        [
            self.genero.as_str(),
            self.grupo.as_str(),
            self.rubro.as_str(),
            self.cuenta.as_str(),
            self.subcuenta.as_str(),
            self.dependencia.as_str(),
            self.unidad_responsable.as_str(),
            self.centro_costo.as_str(),
            self.proyecto_presupuestario.as_str(),
            self.fuente.as_str(),
            self.subfuente.as_str(),
            self.tipo_recurso.as_str(),
            self.partida_presupuestal.as_str(),
        ]
        .concat()
    }
}

/// Normalized output unit of the pipeline. Immutable once emitted by the
/// parser; the persistence sink owns it from there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub batch_id: String,
    pub source_file: String,
    pub account_code: String,
    pub account_name: String,
    pub components: AccountComponents,
    pub date: NaiveDate,
    pub policy: String,
    pub payment_order: String,
    pub payee: String,
    pub description: String,
    pub opening_balance: Decimal,
    pub charge: Decimal,
    pub credit: Decimal,
    pub closing_balance: Decimal,
}

/// Non-fatal problems recorded while scanning/parsing. Surfaced on the
/// batch manifest, never thrown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarningKind {
    MissingOpeningBalance { account_code: String },
    MalformedAccountCode { code: String },
    UnparsableMonetaryValue { row: usize, value: String },
    UnparsableDate { row: usize, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestWarning {
    pub file: String,
    #[serde(flatten)]
    pub kind: WarningKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FileStatus {
    Pending,
    Succeeded { records: usize },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub checksum: Option<String>,
    pub status: FileStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Processing,
    Completed,
    Error,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Error => "error",
        }
    }
}

/// Bookkeeping for one ingestion run. Created when the run starts, mutated
/// behind a lock as files resolve, finalized when every file has a status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchManifest {
    pub batch_id: String,
    pub user: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: BatchStatus,
    pub message: Option<String>,
    pub files: Vec<FileEntry>,
    pub warnings: Vec<IngestWarning>,
    pub total_records: u64,
}

impl BatchManifest {
    pub fn new(batch_id: String, user: &str, filenames: &[String]) -> Self {
        Self {
            batch_id,
            user: user.to_string(),
            created_at: Utc::now(),
            completed_at: None,
            status: BatchStatus::Processing,
            message: None,
            files: filenames
                .iter()
                .map(|name| FileEntry {
                    name: name.clone(),
                    checksum: None,
                    status: FileStatus::Pending,
                })
                .collect(),
            warnings: Vec::new(),
            total_records: 0,
        }
    }

    fn entry_mut(&mut self, name: &str) -> Option<&mut FileEntry> {
        self.files.iter_mut().find(|f| f.name == name)
    }

    pub fn set_checksum(&mut self, name: &str, checksum: String) {
        if let Some(entry) = self.entry_mut(name) {
            entry.checksum = Some(checksum);
        }
    }

    pub fn mark_succeeded(&mut self, name: &str, records: usize) {
        if let Some(entry) = self.entry_mut(name) {
            entry.status = FileStatus::Succeeded { records };
        }
    }

    pub fn mark_failed(&mut self, name: &str, error: String) {
        if let Some(entry) = self.entry_mut(name) {
            entry.status = FileStatus::Failed { error };
        }
    }

    pub fn files_failed(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Failed { .. }))
            .count()
    }

    pub fn files_succeeded(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Succeeded { .. }))
            .count()
    }

    /// Marks the whole batch failed outside the per-file flow, e.g. when
    /// the persistence sink rejects a chunk. Per-file statuses are kept.
    pub fn abort(&mut self, message: String) {
        self.completed_at = Some(Utc::now());
        self.status = BatchStatus::Error;
        self.message = Some(message);
    }

    /// Stamps the terminal status once every file has resolved. A batch
    /// where every file failed is an `Error` outcome, reported rather than
    /// raised.
    pub fn finalize(&mut self) {
        self.completed_at = Some(Utc::now());
        if !self.files.is_empty() && self.files_failed() == self.files.len() {
            self.status = BatchStatus::Error;
            self.message = Some(format!("All {} file(s) failed to parse", self.files.len()));
        } else {
            self.status = BatchStatus::Completed;
            self.message = Some(format!(
                "Processed {} record(s) from {} of {} file(s)",
                self.total_records,
                self.files_succeeded(),
                self.files.len()
            ));
        }
    }
}
