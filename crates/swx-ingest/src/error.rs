//! Error types for the ingestion pipeline

use chrono::NaiveDate;
use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Main error type for the ingestion pipeline
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("No data directory found for date {0}")]
    TargetDateNotFound(NaiveDate),

    #[error("Unknown processing status '{0}' in processing_log")]
    UnknownStatus(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Retrieval failed: {0}")]
    Retrieval(String),
}

impl IngestError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn retrieval(message: impl Into<String>) -> Self {
        Self::Retrieval(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let date = NaiveDate::from_ymd_opt(2099, 1, 1);
        assert!(date.is_some());
        if let Some(date) = date {
            assert_eq!(
                IngestError::TargetDateNotFound(date).to_string(),
                "No data directory found for date 2099-01-01"
            );
        }
        assert_eq!(
            IngestError::InvalidDate("2024-13-01".into()).to_string(),
            "Invalid date '2024-13-01': expected YYYY-MM-DD"
        );
        assert_eq!(IngestError::config("missing key").to_string(), "Configuration error: missing key");
        assert_eq!(
            IngestError::UnknownStatus("done".into()).to_string(),
            "Unknown processing status 'done' in processing_log"
        );
    }
}
