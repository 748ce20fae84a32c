//! SWX Ingest Library
//!
//! Loads daily space-weather CSV exports into Postgres.
//!
//! The working directory holds one folder per day:
//!
//! ```text
//! data/
//!   2024-06-01/
//!     boulder_k_index_1m_2024-06-01.csv
//!     primary-xray-1-day_2024-06-01.csv
//!     ...
//! ```
//!
//! Each file's name selects a [`dataset::DatasetKind`]; rows are mapped to
//! typed records ([`mapper`]), bulk-inserted idempotently ([`loader`]), and
//! every finished date is written to `processing_log` so later runs skip it
//! ([`orchestrator`]).
//!
//! # Example
//!
//! ```no_run
//! use swx_ingest::{create_pool, run_migrations, IngestConfig, Orchestrator, PgIngestStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let pool = create_pool(&config.database).await?;
//!     run_migrations(&pool).await?;
//!
//!     let store = PgIngestStore::new(pool, config.batch_size);
//!     let summary = Orchestrator::new(&config, store).process_all().await?;
//!     println!("{} dates ingested", summary.dates_processed);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod dataset;
pub mod db;
pub mod error;
pub mod extract;
pub mod loader;
pub mod mapper;
pub mod orchestrator;
pub mod parsers;
pub mod records;
pub mod retrieval;
pub mod store;

pub use config::{DatabaseConfig, DropboxConfig, IngestConfig};
pub use dataset::DatasetKind;
pub use db::{create_pool, run_migrations};
pub use error::{IngestError, Result};
pub use extract::{extract_archive, ExtractSummary};
pub use mapper::{map_records, MapOutcome};
pub use orchestrator::{Orchestrator, RunSummary};
pub use records::RecordBatch;
pub use retrieval::{ArchiveSource, DropboxArchive, LocalArchive, Retrieved};
pub use store::{IngestStore, PgIngestStore, ProcessingLogEntry, ProcessingStatus};
