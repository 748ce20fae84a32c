//! Date-by-date ingestion over the working directory
//!
//! The working directory holds one `YYYY-MM-DD` directory per day, each with
//! `<tag>_<YYYY-MM-DD>.csv` files. A date moves through
//! `Pending -> Processing -> Logged`, or straight to `Skipped` when the
//! processing log already has it. Dates are handled one at a time in
//! ascending order, and files within a date in name order.
//!
//! Failures of a single file are logged and counted; they never abort the
//! date. The processing log row is written once every file of the date has
//! been attempted.

use chrono::{NaiveDate, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::config::IngestConfig;
use crate::dataset::DatasetKind;
use crate::error::{IngestError, Result};
use crate::mapper::{map_records, MapOutcome};
use crate::parsers::parse_date;
use crate::store::{IngestStore, ProcessingLogEntry, ProcessingStatus};

/// Totals for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub dates_processed: usize,
    pub dates_skipped: usize,
    pub files_loaded: usize,
    pub files_failed: usize,
    pub rows_inserted: u64,
}

impl RunSummary {
    fn absorb(&mut self, report: &DateReport) {
        self.dates_processed += 1;
        self.files_loaded += report.succeeded;
        self.files_failed += report.failed;
        self.rows_inserted += report.rows_inserted;
    }
}

/// Per-date counters
#[derive(Debug, Default)]
struct DateReport {
    succeeded: usize,
    failed: usize,
    rows_inserted: u64,
}

enum FileOutcome {
    Loaded(u64),
    /// Mapped to nothing (unknown dataset or no valid rows)
    Empty,
    /// Long-period product; not part of a date's work
    Skipped,
}

pub struct Orchestrator<S> {
    data_dir: PathBuf,
    store: S,
}

impl<S: IngestStore> Orchestrator<S> {
    pub fn new(config: &IngestConfig, store: S) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Ingest every date not yet in the processing log
    ///
    /// An unreadable day directory is logged and left unlogged so the next
    /// run retries it.
    pub async fn process_all(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let dates = self.date_directories()?;
        info!(dates = dates.len(), root = %self.data_dir.display(), "Scanning working directory");

        for (date, dir) in dates {
            if self.store.is_processed(date).await? {
                info!(date = %date, "Date already processed, skipping");
                summary.dates_skipped += 1;
                continue;
            }

            let files = match csv_files(&dir) {
                Ok(files) => files,
                Err(e) => {
                    error!(date = %date, error = %e, "Failed to read date directory");
                    continue;
                },
            };

            let report = self.ingest_date(date, files).await?;
            summary.absorb(&report);
        }

        Ok(summary)
    }

    /// Ingest a single date
    ///
    /// Returns `TargetDateNotFound` when the working directory has no
    /// directory for `date`. An already-processed date is a successful no-op.
    pub async fn process_date(&self, date: NaiveDate) -> Result<RunSummary> {
        let dir = self
            .date_directories()?
            .into_iter()
            .find_map(|(candidate, dir)| (candidate == date).then_some(dir))
            .ok_or(IngestError::TargetDateNotFound(date))?;

        let mut summary = RunSummary::default();

        if self.store.is_processed(date).await? {
            info!(date = %date, "Date already processed, nothing to do");
            summary.dates_skipped += 1;
            return Ok(summary);
        }

        let files = csv_files(&dir)?;
        let report = self.ingest_date(date, files).await?;
        summary.absorb(&report);

        Ok(summary)
    }

    /// Day directories under the root, sorted by date
    ///
    /// Symlinked days are listed unresolved; a broken link surfaces later as
    /// an unreadable day directory.
    fn date_directories(&self) -> Result<Vec<(NaiveDate, PathBuf)>> {
        let mut dates = Vec::new();

        for entry in fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if !(file_type.is_dir() || file_type.is_symlink()) {
                continue;
            }

            let name = entry.file_name();
            let name = name.to_string_lossy();
            match parse_date(&name) {
                Some(date) => dates.push((date, entry.path())),
                None => warn!(directory = %name, "Ignoring directory with non-date name"),
            }
        }

        dates.sort_by_key(|(date, _)| *date);
        Ok(dates)
    }

    async fn ingest_date(&self, date: NaiveDate, files: Vec<PathBuf>) -> Result<DateReport> {
        info!(date = %date, files = files.len(), "Processing date");
        let mut report = DateReport::default();

        for path in &files {
            match self.ingest_file(date, path).await {
                Ok(FileOutcome::Loaded(rows)) => {
                    report.succeeded += 1;
                    report.rows_inserted += rows;
                },
                Ok(FileOutcome::Empty) => report.succeeded += 1,
                Ok(FileOutcome::Skipped) => {},
                Err(e) => {
                    error!(file = %path.display(), error = %e, "Failed to ingest file");
                    report.failed += 1;
                },
            }
        }

        let entry = ProcessingLogEntry {
            date,
            files_count: i32::try_from(report.succeeded).unwrap_or(i32::MAX),
            processed_at: Utc::now(),
            status: ProcessingStatus::from_counts(report.succeeded, report.failed),
        };
        self.store.record_processing(&entry).await?;

        info!(
            date = %date,
            files = report.succeeded,
            failed = report.failed,
            rows = report.rows_inserted,
            status = %entry.status,
            "Date processed"
        );

        Ok(report)
    }

    async fn ingest_file(&self, date: NaiveDate, path: &Path) -> Result<FileOutcome> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let kind = DatasetKind::from_tag(dataset_tag(&file_name, date));

        if kind.is_long_period() {
            info!(file = %file_name, "Skipping long-period dataset");
            return Ok(FileOutcome::Skipped);
        }

        let rows = read_rows(path)?;
        let batch = match map_records(&kind, &rows) {
            MapOutcome::Records(batch) => batch,
            MapOutcome::NoOp => {
                debug!(file = %file_name, kind = %kind, "No records to load");
                return Ok(FileOutcome::Empty);
            },
        };

        let mapped = batch.len();
        let inserted = self.store.load(&batch).await?;
        info!(
            file = %file_name,
            table = batch.table_name(),
            mapped = mapped,
            inserted = inserted,
            "File loaded"
        );

        Ok(FileOutcome::Loaded(inserted))
    }
}

/// `.csv` regular files of a day directory, in name order
fn csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_csv = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(".csv"));
        if is_csv && entry.file_type()?.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// `boulder_k_index_1m_2024-06-01.csv` -> `boulder_k_index_1m`
///
/// A name without the date suffix is used whole and will not match any tag.
fn dataset_tag(file_name: &str, date: NaiveDate) -> &str {
    let suffix = format!("_{}.csv", date.format("%Y-%m-%d"));
    file_name.strip_suffix(suffix.as_str()).unwrap_or(file_name)
}

/// Every row of a CSV file, header included; rows may differ in width
fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    reader
        .records()
        .map(|record| {
            record
                .map(|record| record.iter().map(str::to_string).collect())
                .map_err(IngestError::from)
        })
        .collect()
}
