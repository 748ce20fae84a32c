//! Persistence seam for the orchestrator
//!
//! [`IngestStore`] is everything the orchestrator needs from the database:
//! the processed-date gate, bulk loading and the processing log.
//! [`PgIngestStore`] is the production implementation.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Row};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::loader::insert_batch;
use crate::records::RecordBatch;

/// Outcome recorded for a processed date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStatus {
    /// Every attempted file loaded
    Completed,
    /// Some files loaded, some failed
    Partial,
    /// Files were attempted and none loaded
    Failed,
}

impl ProcessingStatus {
    pub fn from_counts(succeeded: usize, failed: usize) -> Self {
        match (succeeded, failed) {
            (_, 0) => ProcessingStatus::Completed,
            (0, _) => ProcessingStatus::Failed,
            _ => ProcessingStatus::Partial,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Partial => "partial",
            ProcessingStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = IngestError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "completed" => Ok(ProcessingStatus::Completed),
            "partial" => Ok(ProcessingStatus::Partial),
            "failed" => Ok(ProcessingStatus::Failed),
            other => Err(IngestError::UnknownStatus(other.to_string())),
        }
    }
}

/// One `processing_log` row
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingLogEntry {
    pub date: NaiveDate,
    pub files_count: i32,
    pub processed_at: DateTime<Utc>,
    pub status: ProcessingStatus,
}

#[async_trait]
pub trait IngestStore: Send + Sync {
    /// True when a processing log row exists for `date`
    async fn is_processed(&self, date: NaiveDate) -> Result<bool>;

    /// Load one mapped file, returning the number of rows inserted
    async fn load(&self, batch: &RecordBatch) -> Result<u64>;

    /// Write the processing log row for a date
    async fn record_processing(&self, entry: &ProcessingLogEntry) -> Result<()>;
}

/// Postgres-backed store
#[derive(Clone)]
pub struct PgIngestStore {
    pool: PgPool,
    batch_size: usize,
}

impl PgIngestStore {
    pub fn new(pool: PgPool, batch_size: usize) -> Self {
        Self { pool, batch_size }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Fetch the log row for a date, if any
    pub async fn processing_entry(&self, date: NaiveDate) -> Result<Option<ProcessingLogEntry>> {
        let row = sqlx::query(
            "SELECT date, files_count, processed_at, status FROM processing_log WHERE date = $1",
        )
        .bind(date_key(date))
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<ProcessingLogEntry> {
            let status: String = row.try_get("status")?;
            Ok(ProcessingLogEntry {
                date,
                files_count: row.try_get("files_count")?,
                processed_at: row.try_get("processed_at")?,
                status: status.parse()?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl IngestStore for PgIngestStore {
    async fn is_processed(&self, date: NaiveDate) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM processing_log WHERE date = $1)")
                .bind(date_key(date))
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn load(&self, batch: &RecordBatch) -> Result<u64> {
        insert_batch(&self.pool, batch, self.batch_size).await
    }

    async fn record_processing(&self, entry: &ProcessingLogEntry) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO processing_log (date, files_count, processed_at, status)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (date) DO NOTHING
            "#,
        )
        .bind(date_key(entry.date))
        .bind(entry.files_count)
        .bind(entry.processed_at)
        .bind(entry.status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(date = %entry.date, "Processing log row already present");
        }

        Ok(())
    }
}

/// Dates are stored as `YYYY-MM-DD` text
fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
