//! SWX Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Pieces shared by every SWX binary. Today that is the logging setup:
//!
//! ```no_run
//! use swx_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::builder().log_file_prefix("swx-ingest").build().merge_env()?;
//!     let _guard = init_logging(&config)?;
//!     tracing::info!("Application started");
//!     Ok(())
//! }
//! ```

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel, LogOutput};
