//! Source archive retrieval.

use async_trait::async_trait;
use lighthouse_core::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Something that can place a repository archive in the download area.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Download `url` to `<download_dir>/<target_name>.zip` and return that path.
    async fn fetch(
        &self,
        url: &str,
        download_dir: &Path,
        target_name: &str,
        cancel: &CancellationToken,
    ) -> Result<PathBuf>;
}

/// Fetches archives with a single HTTP GET. No retries.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Create with a custom HTTP client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Stream the response body into `dest`, returning the byte count.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Transfer(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transfer(format!("GET {} returned {}", url, status)));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| Error::Transfer(format!("failed to create {}: {}", dest.display(), e)))?;

        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::Transfer(format!("failed reading body of {}: {}", url, e)))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::Transfer(format!("failed to write {}: {}", dest.display(), e)))?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| Error::Transfer(format!("failed to write {}: {}", dest.display(), e)))?;

        Ok(written)
    }
}

#[async_trait]
impl ArchiveSource for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        download_dir: &Path,
        target_name: &str,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        info!(url = %url, target = %target_name, "Downloading archive");

        tokio::fs::create_dir_all(download_dir).await.map_err(|e| {
            Error::Transfer(format!(
                "failed to create download area {}: {}",
                download_dir.display(),
                e
            ))
        })?;

        let dest = download_dir.join(format!("{}.zip", target_name));
        let partial = download_dir.join(format!("{}.zip.part", target_name));

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = self.download(url, &partial) => result,
        };

        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&partial).await {
                    if remove_err.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %partial.display(), error = %remove_err, "Failed to remove partial download");
                    }
                }
                return Err(e);
            }
        };

        tokio::fs::rename(&partial, &dest).await.map_err(|e| {
            Error::Transfer(format!("failed to move archive to {}: {}", dest.display(), e))
        })?;

        info!(path = %dest.display(), bytes, "Archive downloaded");
        Ok(dest)
    }
}
