//! Where the daily archives come from
//!
//! An [`ArchiveSource`] either hands back an archive to extract or reports
//! that the working directory is already populated, in which case nothing is
//! downloaded and extraction is skipped.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::config::DropboxConfig;
use crate::error::{IngestError, Result};

// ============================================================================
// Dropbox Constants
// ============================================================================

pub const DROPBOX_API_URL: &str = "https://api.dropbox.com";
pub const DROPBOX_CONTENT_URL: &str = "https://content.dropboxapi.com";

/// Folder downloads can be large; allow up to 10 minutes.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retrieved {
    /// The working directory already holds the data
    AlreadyMaterialized(PathBuf),
    /// Archive on local disk, ready to extract
    Archive(PathBuf),
}

#[async_trait]
pub trait ArchiveSource: Send + Sync {
    async fn fetch(&self, target_date: Option<NaiveDate>) -> Result<Retrieved>;
}

/// Existing working directory for this run, if any
///
/// For a single date only `<data_dir>/<date>` counts. A data directory that
/// exists as a regular file is an error.
fn existing_directory(data_dir: &Path, target_date: Option<NaiveDate>) -> Result<Option<PathBuf>> {
    if data_dir.exists() && !data_dir.is_dir() {
        return Err(IngestError::retrieval(format!(
            "data directory {} exists and is not a directory",
            data_dir.display()
        )));
    }

    let candidate = match target_date {
        Some(date) => data_dir.join(date.format("%Y-%m-%d").to_string()),
        None => data_dir.to_path_buf(),
    };

    Ok(candidate.is_dir().then_some(candidate))
}

/// An archive already on disk
#[derive(Debug, Clone)]
pub struct LocalArchive {
    archive: PathBuf,
    data_dir: PathBuf,
}

impl LocalArchive {
    pub fn new(archive: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive: archive.into(),
            data_dir: data_dir.into(),
        }
    }
}

#[async_trait]
impl ArchiveSource for LocalArchive {
    async fn fetch(&self, target_date: Option<NaiveDate>) -> Result<Retrieved> {
        if let Some(existing) = existing_directory(&self.data_dir, target_date)? {
            info!(path = %existing.display(), "Working directory already present, skipping extraction");
            return Ok(Retrieved::AlreadyMaterialized(existing));
        }

        if !self.archive.is_file() {
            return Err(IngestError::retrieval(format!(
                "archive {} not found",
                self.archive.display()
            )));
        }

        Ok(Retrieved::Archive(self.archive.clone()))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

/// Folder download from Dropbox
///
/// Exchanges the long-lived refresh token for an access token, then
/// downloads the configured folder (or its `<date>` subfolder) as one zip.
pub struct DropboxArchive {
    client: Client,
    config: DropboxConfig,
    data_dir: PathBuf,
    download_dir: PathBuf,
    api_url: String,
    content_url: String,
}

impl DropboxArchive {
    pub fn new(config: DropboxConfig, data_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            config,
            data_dir: data_dir.into(),
            download_dir: std::env::temp_dir(),
            api_url: DROPBOX_API_URL.to_string(),
            content_url: DROPBOX_CONTENT_URL.to_string(),
        })
    }

    /// Point both API hosts somewhere else (tests, proxies)
    pub fn with_endpoints(mut self, api_url: impl Into<String>, content_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self.content_url = content_url.into();
        self
    }

    pub fn with_download_dir(mut self, download_dir: impl Into<PathBuf>) -> Self {
        self.download_dir = download_dir.into();
        self
    }

    fn remote_path(&self, target_date: Option<NaiveDate>) -> String {
        let folder = self.config.folder.trim_end_matches('/');
        match target_date {
            Some(date) => format!("{}/{}", folder, date.format("%Y-%m-%d")),
            None => folder.to_string(),
        }
    }

    async fn access_token(&self) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/oauth2/token", self.api_url))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.config.refresh_token.as_str()),
                ("client_id", self.config.app_key.as_str()),
                ("client_secret", self.config.app_secret.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::retrieval(format!(
                "failed to get access token ({}): {}",
                status, body
            )));
        }

        let token: TokenResponse = response.json().await?;
        tracing::debug!(expires_in = ?token.expires_in, "Obtained Dropbox access token");
        Ok(token.access_token)
    }

    async fn download(&self, access_token: &str, remote_path: &str) -> Result<PathBuf> {
        let arg = serde_json::json!({ "path": remote_path }).to_string();

        let response = self
            .client
            .post(format!("{}/2/files/download_zip", self.content_url))
            .bearer_auth(access_token)
            .header("Dropbox-API-Arg", arg)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::retrieval(format!(
                "download of {} failed ({}): {}",
                remote_path, status, body
            )));
        }

        let bytes = response.bytes().await?;
        let file_name = format!("swx_dropbox_{}.zip", Utc::now().format("%Y%m%d_%H%M%S"));
        let path = self.download_dir.join(file_name);
        tokio::fs::create_dir_all(&self.download_dir).await?;
        tokio::fs::write(&path, &bytes).await?;

        info!(
            remote = remote_path,
            path = %path.display(),
            bytes = bytes.len(),
            "Archive downloaded"
        );

        Ok(path)
    }
}

#[async_trait]
impl ArchiveSource for DropboxArchive {
    async fn fetch(&self, target_date: Option<NaiveDate>) -> Result<Retrieved> {
        if let Some(existing) = existing_directory(&self.data_dir, target_date)? {
            info!(path = %existing.display(), "Working directory already present, skipping download");
            return Ok(Retrieved::AlreadyMaterialized(existing));
        }

        let remote_path = self.remote_path(target_date);
        info!(remote = %remote_path, "Downloading from Dropbox");

        let token = self.access_token().await?;
        let archive = self.download(&token, &remote_path).await?;
        Ok(Retrieved::Archive(archive))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dropbox_config() -> DropboxConfig {
        DropboxConfig {
            app_key: "key".to_string(),
            app_secret: "secret".to_string(),
            refresh_token: "refresh".to_string(),
            folder: "/inzynierka".to_string(),
        }
    }

    fn dropbox(server: &MockServer, tmp: &TempDir) -> DropboxArchive {
        DropboxArchive::new(dropbox_config(), tmp.path().join("data"))
            .unwrap()
            .with_endpoints(server.uri(), server.uri())
            .with_download_dir(tmp.path().join("downloads"))
    }

    #[tokio::test]
    async fn test_dropbox_download_for_date() {
        let server = MockServer::start().await;
        let tmp = TempDir::new().unwrap();

        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok",
                "token_type": "bearer",
                "expires_in": 14400
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/2/files/download_zip"))
            .and(header("authorization", "Bearer tok"))
            .and(header("Dropbox-API-Arg", r#"{"path":"/inzynierka/2024-06-01"}"#))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK-zip-bytes".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let source = dropbox(&server, &tmp);
        let retrieved = source.fetch(NaiveDate::from_ymd_opt(2024, 6, 1)).await.unwrap();

        let Retrieved::Archive(archive) = retrieved else {
            panic!("expected a downloaded archive");
        };
        assert!(archive.starts_with(tmp.path().join("downloads")));
        assert_eq!(std::fs::read(&archive).unwrap(), b"PK-zip-bytes");
    }

    #[tokio::test]
    async fn test_dropbox_token_failure() {
        let server = MockServer::start().await;
        let tmp = TempDir::new().unwrap();

        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let err = dropbox(&server, &tmp).fetch(None).await.unwrap_err();
        assert!(matches!(err, IngestError::Retrieval(ref msg) if msg.contains("invalid_grant")));
    }

    #[tokio::test]
    async fn test_existing_directory_skips_download() {
        let server = MockServer::start().await;
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("data")).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let retrieved = dropbox(&server, &tmp).fetch(None).await.unwrap();
        assert_eq!(retrieved, Retrieved::AlreadyMaterialized(tmp.path().join("data")));
    }

    #[tokio::test]
    async fn test_data_dir_that_is_a_file() {
        let tmp = TempDir::new().unwrap();
        let data_dir = tmp.path().join("data");
        std::fs::write(&data_dir, "oops").unwrap();

        let source = LocalArchive::new(tmp.path().join("a.zip"), &data_dir);
        assert!(matches!(source.fetch(None).await, Err(IngestError::Retrieval(_))));
    }

    #[tokio::test]
    async fn test_local_archive() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("daily.zip");
        std::fs::write(&archive, "zip").unwrap();
        let data_dir = tmp.path().join("data");

        let source = LocalArchive::new(&archive, &data_dir);
        assert_eq!(source.fetch(None).await.unwrap(), Retrieved::Archive(archive.clone()));

        // only the requested date's directory counts as materialized
        std::fs::create_dir_all(data_dir.join("2024-05-31")).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 6, 1);
        assert_eq!(source.fetch(date).await.unwrap(), Retrieved::Archive(archive));

        let missing = LocalArchive::new(tmp.path().join("absent.zip"), tmp.path().join("other"));
        assert!(missing.fetch(None).await.is_err());
    }
}
