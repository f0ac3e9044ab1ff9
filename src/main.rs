use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use auxledger::orchestrator::{Orchestrator, SourceFile};
use auxledger::settings::{load_settings, save_settings};
use auxledger::sink::{get_connection, LogProgress, SqliteSink};
use auxledger::models::{BatchStatus, FileStatus};

#[derive(Parser)]
#[command(name = "auxledger", version, about = "Ingest auxiliary ledger spreadsheets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse ledger files and load them into a SQLite database
    Ingest {
        /// Ledger files (.xlsx, .xls, .csv)
        files: Vec<PathBuf>,
        /// Target database path
        #[arg(long)]
        db: PathBuf,
        /// Recorded as the batch's loading user
        #[arg(long, default_value = "system")]
        user: String,
        /// Records per bulk write
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Parse worker ceiling
        #[arg(long)]
        workers: Option<usize>,
    },
    /// List past ingestion batches
    Batches {
        #[arg(long)]
        db: PathBuf,
    },
    /// Show pipeline settings, persisting any given overrides
    Config {
        /// Records per bulk write
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Parse worker ceiling
        #[arg(long)]
        workers: Option<usize>,
        /// Per-file size limit in megabytes
        #[arg(long)]
        max_file_size_mb: Option<u64>,
    },
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest {
            files,
            db,
            user,
            chunk_size,
            workers,
        } => ingest(files, db, user, chunk_size, workers),
        Commands::Batches { db } => batches(db),
        Commands::Config {
            chunk_size,
            workers,
            max_file_size_mb,
        } => config(chunk_size, workers, max_file_size_mb),
    }
}

fn config(
    chunk_size: Option<usize>,
    workers: Option<usize>,
    max_file_size_mb: Option<u64>,
) -> anyhow::Result<()> {
    let mut settings = load_settings();
    let changed = chunk_size.is_some() || workers.is_some() || max_file_size_mb.is_some();
    if let Some(n) = chunk_size {
        settings.chunk_size = n;
    }
    if let Some(n) = workers {
        settings.max_workers = n;
    }
    if let Some(n) = max_file_size_mb {
        settings.max_file_size_mb = n;
    }
    if changed {
        save_settings(&settings).context("saving settings")?;
    }
    println!("chunk_size        {}", settings.chunk_size);
    println!("max_workers       {}", settings.max_workers);
    println!("max_file_size_mb  {}", settings.max_file_size_mb);
    Ok(())
}

fn ingest(
    paths: Vec<PathBuf>,
    db: PathBuf,
    user: String,
    chunk_size: Option<usize>,
    workers: Option<usize>,
) -> anyhow::Result<()> {
    let mut settings = load_settings();
    if let Some(n) = chunk_size {
        settings.chunk_size = n;
    }
    if let Some(n) = workers {
        settings.max_workers = n;
    }

    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        files.push(
            SourceFile::from_path(path)
                .with_context(|| format!("reading {}", path.display()))?,
        );
    }

    let conn = get_connection(&db)?;
    let mut sink = SqliteSink::new(conn)?;
    let manifest = Orchestrator::new(settings).ingest(&user, files, &mut sink, &LogProgress)?;
    sink.record_manifest(&manifest)?;

    println!("Batch {}", manifest.batch_id);
    for file in &manifest.files {
        match &file.status {
            FileStatus::Succeeded { records } => {
                println!("  ok    {} ({records} records)", file.name)
            }
            FileStatus::Failed { error } => println!("  fail  {} ({error})", file.name),
            FileStatus::Pending => println!("  ?     {}", file.name),
        }
    }
    for warning in &manifest.warnings {
        println!("  warn  {}: {:?}", warning.file, warning.kind);
    }
    println!(
        "{} record(s) loaded from {} of {} file(s)",
        manifest.total_records,
        manifest.files_succeeded(),
        manifest.files.len()
    );

    if manifest.status == BatchStatus::Error {
        bail!(manifest
            .message
            .unwrap_or_else(|| "batch failed".to_string()));
    }
    Ok(())
}

fn batches(db: PathBuf) -> anyhow::Result<()> {
    let conn = get_connection(&db)?;
    let sink = SqliteSink::new(conn)?;
    let batches = sink.list_batches()?;
    if batches.is_empty() {
        println!("No batches recorded.");
        return Ok(());
    }
    for b in batches {
        println!(
            "{}  {}  {}  {} record(s)  {}",
            b.batch_id,
            b.created_at,
            b.status,
            b.total_records,
            b.message.unwrap_or_default()
        );
    }
    Ok(())
}
