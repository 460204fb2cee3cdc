//! Standalone file download: GET a URL and save the body to disk.
//!
//! Unlike the click workflow, failures here are returned to the caller.
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::future::try_join_all;
use futures_util::StreamExt;
use hamster_logging::hamster_info;
use thiserror::Error;

use crate::persist::{write_atomic, PersistError};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid download url {url}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("Failed to download file: {status}")]
    Status { status: reqwest::StatusCode },
    #[error("Network error occurred while downloading file.")]
    Network(#[source] reqwest::Error),
    #[error("failed to save download: {0}")]
    Save(#[from] PersistError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub url: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
}

impl Downloader {
    pub fn new(timeout: Duration) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(DownloadError::Network)?;
        Ok(Self { client })
    }

    /// Downloads `url` into `path`, replacing any existing file. Returns the
    /// number of bytes written.
    pub async fn download_file(&self, url: &str, path: &Path) -> Result<u64, DownloadError> {
        let parsed = url::Url::parse(url).map_err(|err| DownloadError::InvalidUrl {
            url: url.to_string(),
            message: err.to_string(),
        })?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(DownloadError::Network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status { status });
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk.map_err(DownloadError::Network)?);
        }

        let written = write_atomic(path, &body)?;
        hamster_info!("Saved {} bytes from {} to {}", body.len(), url, written.display());
        Ok(body.len() as u64)
    }

    /// Downloads all targets concurrently; the first failure fails the batch.
    pub async fn download_files(&self, targets: &[DownloadTarget]) -> Result<u64, DownloadError> {
        let sizes = try_join_all(
            targets
                .iter()
                .map(|target| self.download_file(&target.url, &target.path)),
        )
        .await?;
        Ok(sizes.into_iter().sum())
    }
}
