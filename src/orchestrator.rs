//! Batch ingestion: bounded parallel parsing, sequential persistence.
//!
//! One worker per file up to a fixed concurrency ceiling; parsed record
//! streams are collected in completion order and written to the sink in
//! fixed-size chunks, one chunk at a time. The manifest is the single
//! shared structure and every per-file update goes through its lock.

use std::path::Path;
use std::sync::{Arc, Mutex};

use crossbeam_channel::bounded;
use log::{info, warn};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{LedgerError, Result};
use crate::models::{BatchManifest, TransactionRecord};
use crate::parser::{parse_file, XLSX_EXTENSIONS};
use crate::settings::Settings;
use crate::sink::{PersistenceSink, ProgressSink};

/// One input file: the orchestrator owns the bytes for the duration of
/// the batch.
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let bytes = std::fs::read(path)?;
        Ok(Self { name, bytes })
    }
}

fn validate(file: &SourceFile, max_bytes: u64) -> Result<()> {
    let ext = Path::new(&file.name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if !XLSX_EXTENSIONS.contains(&ext.as_str()) && ext != "csv" {
        return Err(LedgerError::UnsupportedExtension(file.name.clone()));
    }
    let size = file.bytes.len() as u64;
    if size > max_bytes {
        const MB: u64 = 1024 * 1024;
        return Err(LedgerError::FileTooLarge {
            name: file.name.clone(),
            size_mb: size.div_ceil(MB),
            limit_mb: max_bytes / MB,
        });
    }
    Ok(())
}

pub struct Orchestrator {
    settings: Settings,
}

impl Orchestrator {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Ingests one batch of files. Blocks until every file has resolved
    /// and all records are handed to the sink, then returns the finalized
    /// manifest.
    ///
    /// File-level failures (unreadable format, oversize, bad extension)
    /// are isolated: they mark that file failed and never cancel
    /// siblings. A batch where every file failed, or where the sink
    /// rejected a chunk, returns `Ok` with an `Error`-status manifest so
    /// per-file outcomes survive. `Err` is reserved for a batch with no
    /// files at all.
    pub fn ingest(
        &self,
        user: &str,
        files: Vec<SourceFile>,
        sink: &mut dyn PersistenceSink,
        progress: &dyn ProgressSink,
    ) -> Result<BatchManifest> {
        if files.is_empty() {
            return Err(LedgerError::EmptyBatch);
        }

        let batch_id = Uuid::new_v4().to_string();
        let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        let files_total = files.len();
        let worker_count = self.settings.max_workers.max(1).min(files_total);
        let chunk_size = self.settings.chunk_size.max(1);
        let max_bytes = self.settings.max_file_size_mb.saturating_mul(1024 * 1024);

        info!(
            "batch {batch_id}: ingesting {files_total} file(s) with {worker_count} worker(s)"
        );

        let manifest = Arc::new(Mutex::new(BatchManifest::new(
            batch_id.clone(),
            user,
            &names,
        )));

        let (job_tx, job_rx) = bounded::<SourceFile>(files_total);
        let (res_tx, res_rx) = bounded::<Vec<TransactionRecord>>(files_total);
        for file in files {
            let _ = job_tx.send(file);
        }
        drop(job_tx);

        let mut sink_error: Option<LedgerError> = None;

        std::thread::scope(|s| {
            for _ in 0..worker_count {
                let job_rx = job_rx.clone();
                let res_tx = res_tx.clone();
                let manifest = Arc::clone(&manifest);
                let batch_id = batch_id.clone();
                s.spawn(move || {
                    while let Ok(file) = job_rx.recv() {
                        let checksum = hex::encode(Sha256::digest(&file.bytes));
                        let outcome =
                            validate(&file, max_bytes).and_then(|_| parse_file(&file.name, &file.bytes));

                        let mut m = manifest.lock().expect("manifest lock poisoned");
                        m.set_checksum(&file.name, checksum);
                        let records = match outcome {
                            Ok(mut parsed) => {
                                m.mark_succeeded(&file.name, parsed.records.len());
                                m.warnings.append(&mut parsed.warnings);
                                for r in &mut parsed.records {
                                    r.batch_id = batch_id.clone();
                                }
                                parsed.records
                            }
                            Err(err) => {
                                warn!("batch {batch_id}: {} failed: {err}", file.name);
                                m.mark_failed(&file.name, err.to_string());
                                Vec::new()
                            }
                        };
                        drop(m);
                        let _ = res_tx.send(records);
                    }
                });
            }
            drop(job_rx);
            drop(res_tx);

            // Collection and persistence stay on this thread: chunks are
            // written strictly one after another, never interleaved.
            let mut pending: Vec<TransactionRecord> = Vec::new();
            let mut files_completed = 0usize;
            let mut records_written = 0u64;

            for records in res_rx.iter() {
                files_completed += 1;
                if sink_error.is_some() {
                    continue;
                }
                pending.extend(records);
                while pending.len() >= chunk_size {
                    let chunk: Vec<TransactionRecord> = pending.drain(..chunk_size).collect();
                    match sink.write_chunk(&batch_id, &chunk) {
                        Ok(()) => {
                            records_written += chunk.len() as u64;
                            manifest.lock().expect("manifest lock poisoned").total_records =
                                records_written;
                            progress.report(&batch_id, files_completed, files_total, records_written);
                        }
                        Err(err) => {
                            sink_error = Some(err);
                            pending.clear();
                            break;
                        }
                    }
                }
            }

            if sink_error.is_none() {
                if !pending.is_empty() {
                    let chunk: Vec<TransactionRecord> = std::mem::take(&mut pending);
                    match sink.write_chunk(&batch_id, &chunk) {
                        Ok(()) => {
                            records_written += chunk.len() as u64;
                            manifest.lock().expect("manifest lock poisoned").total_records =
                                records_written;
                        }
                        Err(err) => sink_error = Some(err),
                    }
                }
                progress.report(&batch_id, files_completed, files_total, records_written);
            }
        });

        let mut manifest = match Arc::try_unwrap(manifest) {
            Ok(m) => m.into_inner().unwrap_or_else(|e| e.into_inner()),
            Err(_) => {
                return Err(LedgerError::Other(
                    "batch manifest still shared after workers finished".to_string(),
                ))
            }
        };

        if let Some(err) = sink_error {
            warn!("batch {batch_id}: persistence failed: {err}");
            manifest.abort(format!("Persistence failed: {err}"));
            return Ok(manifest);
        }

        manifest.finalize();
        info!(
            "batch {batch_id}: done, {} record(s), {} succeeded / {} failed",
            manifest.total_records,
            manifest.files_succeeded(),
            manifest.files_failed()
        );
        Ok(manifest)
    }
}
