//! Scratch directories owned by the pipeline.

use lighthouse_config::PathsConfig;
use lighthouse_core::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Subdirectory recreated in the staging area on every clean.
pub const WORKING_DIR: &str = "Working";

/// The download and staging areas.
///
/// Only one pipeline run may use a workspace at a time: a second run's clean
/// would destroy the first run's files.
#[derive(Debug, Clone)]
pub struct Workspace {
    download: PathBuf,
    staging: PathBuf,
}

impl Workspace {
    pub fn new(download: impl Into<PathBuf>, staging: impl Into<PathBuf>) -> Result<Self> {
        let download = download.into();
        let staging = staging.into();

        if download.as_os_str().is_empty() {
            return Err(Error::Workspace("download path not set".to_string()));
        }
        if staging.as_os_str().is_empty() {
            return Err(Error::Workspace("staging path not set".to_string()));
        }

        Ok(Self { download, staging })
    }

    pub fn from_config(paths: &PathsConfig) -> Result<Self> {
        Self::new(&paths.download, &paths.staging)
    }

    pub fn download_dir(&self) -> &Path {
        &self.download
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }

    /// Where the archive for `name` is downloaded.
    pub fn archive_path(&self, name: &str) -> PathBuf {
        self.download.join(format!("{}.zip", name))
    }

    /// Find the extracted root of a branch archive, `<staging>/<name>-main`.
    ///
    /// Tries the name as given, then lower-cased.
    pub async fn project_dir(&self, name: &str) -> Result<PathBuf> {
        let exact = self.staging.join(format!("{}-main", name));
        let lower = self.staging.join(format!("{}-main", name.to_lowercase()));

        for candidate in [exact, lower] {
            if tokio::fs::metadata(&candidate)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false)
            {
                return Ok(candidate);
            }
        }

        Err(Error::Extraction(format!(
            "archive root {}-main not found in {}",
            name,
            self.staging.display()
        )))
    }

    /// Empty both scratch areas and recreate them, with `Working/` in staging.
    pub async fn clean(&self) -> Result<()> {
        clear_dir(&self.staging).await.map_err(|e| {
            Error::Workspace(format!(
                "failed to clean staging area at {}: {}",
                self.staging.display(),
                e
            ))
        })?;
        tokio::fs::create_dir_all(self.staging.join(WORKING_DIR))
            .await
            .map_err(|e| {
                Error::Workspace(format!(
                    "failed to recreate staging area at {}: {}",
                    self.staging.display(),
                    e
                ))
            })?;

        clear_dir(&self.download).await.map_err(|e| {
            Error::Workspace(format!(
                "failed to clean download area at {}: {}",
                self.download.display(),
                e
            ))
        })?;
        tokio::fs::create_dir_all(&self.download)
            .await
            .map_err(|e| {
                Error::Workspace(format!(
                    "failed to recreate download area at {}: {}",
                    self.download.display(),
                    e
                ))
            })?;

        debug!(
            download = %self.download.display(),
            staging = %self.staging.display(),
            "Workspace cleaned"
        );
        Ok(())
    }
}

/// Remove every entry under `dir`. A missing directory counts as empty.
async fn clear_dir(dir: &Path) -> std::io::Result<()> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        // file_type does not follow symlinks, so linked directories are unlinked, not emptied.
        if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(&path).await?;
        } else {
            tokio::fs::remove_file(&path).await?;
        }
    }

    Ok(())
}
