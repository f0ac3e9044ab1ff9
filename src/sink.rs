//! Downstream collaborators of the pipeline: where records and batch
//! manifests go once parsed, and where progress gets reported.

use std::path::Path;

use log::info;
use rusqlite::Connection;

use crate::error::Result;
use crate::models::{BatchManifest, TransactionRecord};

/// Bulk write target for normalized records. Implementations must keep
/// the order of records within a chunk; the orchestrator already
/// guarantees chunks themselves are written sequentially.
pub trait PersistenceSink {
    fn write_chunk(&mut self, batch_id: &str, records: &[TransactionRecord]) -> Result<()>;
}

/// Fire-and-forget progress reporting after each chunk write.
pub trait ProgressSink {
    fn report(&self, batch_id: &str, files_completed: usize, files_total: usize, records_written: u64);
}

/// Progress sink that logs and nothing more.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, batch_id: &str, files_completed: usize, files_total: usize, records_written: u64) {
        info!(
            "batch {batch_id}: {files_completed}/{files_total} file(s), {records_written} record(s) written"
        );
    }
}

/// In-memory sink, chunk boundaries preserved. Test double.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub chunks: Vec<Vec<TransactionRecord>>,
}

impl MemorySink {
    pub fn records(&self) -> Vec<&TransactionRecord> {
        self.chunks.iter().flatten().collect()
    }
}

impl PersistenceSink for MemorySink {
    fn write_chunk(&mut self, _batch_id: &str, records: &[TransactionRecord]) -> Result<()> {
        self.chunks.push(records.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SQLite persistence
// ---------------------------------------------------------------------------

// Monetary columns are stored as decimal TEXT so amounts survive the
// round trip exactly.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    batch_id TEXT NOT NULL,
    source_file TEXT NOT NULL,
    loaded_at TEXT DEFAULT (datetime('now')),
    account_code TEXT NOT NULL,
    account_name TEXT,
    genero TEXT,
    grupo TEXT,
    rubro TEXT,
    cuenta TEXT,
    subcuenta TEXT,
    dependencia TEXT,
    unidad_responsable TEXT,
    centro_costo TEXT,
    proyecto_presupuestario TEXT,
    fuente TEXT,
    subfuente TEXT,
    tipo_recurso TEXT,
    partida_presupuestal TEXT,
    txn_date TEXT NOT NULL,
    policy TEXT,
    payment_order TEXT,
    payee TEXT,
    description TEXT,
    opening_balance TEXT NOT NULL,
    charge TEXT NOT NULL,
    credit TEXT NOT NULL,
    closing_balance TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_txn_batch ON transactions(batch_id);
CREATE INDEX IF NOT EXISTS idx_txn_account ON transactions(account_code);
CREATE INDEX IF NOT EXISTS idx_txn_date ON transactions(txn_date);
CREATE INDEX IF NOT EXISTS idx_txn_account_date ON transactions(account_code, txn_date);
CREATE INDEX IF NOT EXISTS idx_txn_batch_account ON transactions(batch_id, account_code);

CREATE TABLE IF NOT EXISTS batches (
    id INTEGER PRIMARY KEY,
    batch_id TEXT NOT NULL UNIQUE,
    user TEXT,
    created_at TEXT NOT NULL,
    completed_at TEXT,
    status TEXT NOT NULL,
    message TEXT,
    total_records INTEGER DEFAULT 0,
    files TEXT,
    warnings TEXT
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

/// Row summary for the `batches` listing.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub batch_id: String,
    pub created_at: String,
    pub status: String,
    pub total_records: i64,
    pub message: Option<String>,
}

pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self { conn })
    }

    /// Inserts or replaces the manifest row for a batch.
    pub fn record_manifest(&self, manifest: &BatchManifest) -> Result<()> {
        let files = serde_json::to_string(&manifest.files)
            .map_err(|e| crate::error::LedgerError::Other(e.to_string()))?;
        let warnings = serde_json::to_string(&manifest.warnings)
            .map_err(|e| crate::error::LedgerError::Other(e.to_string()))?;
        self.conn.execute(
            "INSERT OR REPLACE INTO batches \
             (batch_id, user, created_at, completed_at, status, message, total_records, files, warnings) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                manifest.batch_id,
                manifest.user,
                manifest.created_at.to_rfc3339(),
                manifest.completed_at.map(|t| t.to_rfc3339()),
                manifest.status.as_str(),
                manifest.message,
                manifest.total_records as i64,
                files,
                warnings,
            ],
        )?;
        Ok(())
    }

    pub fn list_batches(&self) -> Result<Vec<BatchSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT batch_id, created_at, status, total_records, message \
             FROM batches ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(BatchSummary {
                batch_id: row.get(0)?,
                created_at: row.get(1)?,
                status: row.get(2)?,
                total_records: row.get(3)?,
                message: row.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl PersistenceSink for SqliteSink {
    fn write_chunk(&mut self, batch_id: &str, records: &[TransactionRecord]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO transactions \
                 (batch_id, source_file, account_code, account_name, \
                  genero, grupo, rubro, cuenta, subcuenta, dependencia, unidad_responsable, \
                  centro_costo, proyecto_presupuestario, fuente, subfuente, tipo_recurso, \
                  partida_presupuestal, txn_date, policy, payment_order, payee, description, \
                  opening_balance, charge, credit, closing_balance) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, \
                         ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)",
            )?;
            for r in records {
                stmt.execute(rusqlite::params![
                    batch_id,
                    r.source_file,
                    r.account_code,
                    r.account_name,
                    r.components.genero,
                    r.components.grupo,
                    r.components.rubro,
                    r.components.cuenta,
                    r.components.subcuenta,
                    r.components.dependencia,
                    r.components.unidad_responsable,
                    r.components.centro_costo,
                    r.components.proyecto_presupuestario,
                    r.components.fuente,
                    r.components.subfuente,
                    r.components.tipo_recurso,
                    r.components.partida_presupuestal,
                    r.date.format("%Y-%m-%d").to_string(),
                    r.policy,
                    r.payment_order,
                    r.payee,
                    r.description,
                    r.opening_balance.to_string(),
                    r.charge.to_string(),
                    r.credit.to_string(),
                    r.closing_balance.to_string(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
