//! SWX Ingest - load daily space-weather exports into Postgres

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::path::{Path, PathBuf};
use swx_common::logging::{init_logging, LogConfig, LogLevel};
use swx_ingest::db::health_check;
use swx_ingest::parsers::parse_date;
use swx_ingest::{
    create_pool, extract_archive, run_migrations, ArchiveSource, DropboxArchive, DropboxConfig,
    IngestConfig, IngestError, LocalArchive, Orchestrator, PgIngestStore, Retrieved, RunSummary,
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "swx-ingest")]
#[command(author, version, about = "Load daily space-weather CSV exports into Postgres")]
struct Cli {
    /// Date to ingest (YYYY-MM-DD); every unprocessed date when omitted
    #[arg(value_parser = parse_cli_date)]
    date: Option<NaiveDate>,

    /// Working directory with one folder per date
    #[arg(long, env = "SWX_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Extract this zip archive into the working directory first
    #[arg(long, conflicts_with = "dropbox")]
    archive: Option<PathBuf>,

    /// Download the archive folder from Dropbox first
    #[arg(long)]
    dropbox: bool,

    /// Keep the extracted working directory after the run
    #[arg(long)]
    keep_data: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_cli_date(s: &str) -> std::result::Result<NaiveDate, String> {
    parse_date(s).ok_or_else(|| IngestError::InvalidDate(s.to_string()).to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("swx-ingest")
        .filter_directives("sqlx=warn")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    let mut config = IngestConfig::from_env().context("Failed to load configuration")?;
    if let Some(data_dir) = &cli.data_dir {
        config = config.with_data_dir(data_dir);
    }

    // Checked before retrieval: a directory that was already there is never removed
    let existed_before = config.data_dir.exists();

    let outcome = run(&cli, &config).await;

    if owns_working_directory(&cli, existed_before) {
        remove_working_directory(&config.data_dir);
    }

    let summary = outcome?;
    info!(
        dates_processed = summary.dates_processed,
        dates_skipped = summary.dates_skipped,
        files_loaded = summary.files_loaded,
        files_failed = summary.files_failed,
        rows_inserted = summary.rows_inserted,
        "All operations completed successfully"
    );

    Ok(())
}

async fn run(cli: &Cli, config: &IngestConfig) -> Result<RunSummary> {
    prepare_working_directory(cli, config).await?;

    let pool = create_pool(&config.database)
        .await
        .context("Failed to connect to database")?;
    health_check(&pool).await?;
    run_migrations(&pool).await.context("Failed to run migrations")?;

    let store = PgIngestStore::new(pool, config.batch_size);
    let orchestrator = Orchestrator::new(config, store);

    let summary = match cli.date {
        Some(date) => orchestrator.process_date(date).await?,
        None => orchestrator.process_all().await?,
    };

    Ok(summary)
}

/// Fetch and extract an archive when one was requested
async fn prepare_working_directory(cli: &Cli, config: &IngestConfig) -> Result<()> {
    let source: Box<dyn ArchiveSource> = match (&cli.archive, cli.dropbox) {
        (Some(archive), _) => Box::new(LocalArchive::new(archive, &config.data_dir)),
        (None, true) => {
            let dropbox = DropboxConfig::from_env().context("Dropbox credentials missing")?;
            Box::new(DropboxArchive::new(dropbox, &config.data_dir)?)
        },
        (None, false) => return Ok(()),
    };

    match source.fetch(cli.date).await? {
        Retrieved::AlreadyMaterialized(path) => {
            info!(path = %path.display(), "Using existing working directory");
        },
        Retrieved::Archive(archive) => {
            extract_archive(&archive, &config.data_dir, cli.date)
                .with_context(|| format!("Failed to extract {}", archive.display()))?;

            if cli.dropbox {
                if let Err(e) = std::fs::remove_file(&archive) {
                    warn!(path = %archive.display(), error = %e, "Failed to remove downloaded archive");
                }
            }
        },
    }

    Ok(())
}

/// Whether the run created the working directory and may delete it afterwards
fn owns_working_directory(cli: &Cli, existed_before: bool) -> bool {
    let materialized = cli.archive.is_some() || cli.dropbox;
    materialized && !existed_before && !cli.keep_data
}

fn remove_working_directory(data_dir: &Path) {
    match std::fs::remove_dir_all(data_dir) {
        Ok(()) => info!(path = %data_dir.display(), "Removed working directory"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
        Err(e) => warn!(path = %data_dir.display(), error = %e, "Failed to remove working directory"),
    }
}
