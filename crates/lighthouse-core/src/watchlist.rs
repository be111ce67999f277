//! JSON-backed list of watched repositories.

use chrono::Utc;
use std::path::{Path, PathBuf};

use crate::repository::{RepoTarget, WatchedRepo};
use crate::{Error, Result};

/// The set of repositories Lighthouse keeps deployed.
///
/// Display names, URLs and container names are each unique. The container
/// name is the join key with the container runtime.
#[derive(Debug)]
pub struct WatchList {
    path: PathBuf,
    repos: Vec<WatchedRepo>,
}

impl WatchList {
    /// Load the list from `path`. A missing file is an empty list.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let repos = match std::fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str(&data).map_err(|e| {
                Error::Storage(format!("failed to parse {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(Error::Storage(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        Ok(Self { path, repos })
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("failed to create {}: {}", parent.display(), e)))?;
        }
        let data = serde_json::to_string_pretty(&self.repos)
            .map_err(|e| Error::Storage(format!("failed to encode watch list: {}", e)))?;
        std::fs::write(&self.path, data)
            .map_err(|e| Error::Storage(format!("failed to write {}: {}", self.path.display(), e)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn repos(&self) -> &[WatchedRepo] {
        &self.repos
    }

    pub fn targets(&self) -> Vec<RepoTarget> {
        self.repos.iter().map(|r| r.target.clone()).collect()
    }

    /// Find a repository by display name or (case-insensitively) container name.
    pub fn find(&self, name: &str) -> Option<&WatchedRepo> {
        self.repos.iter().find(|r| Self::matches(r, name))
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut WatchedRepo> {
        self.repos.iter_mut().find(|r| Self::matches(r, name))
    }

    fn matches(repo: &WatchedRepo, name: &str) -> bool {
        repo.target.display_name == name || repo.target.container_name.eq_ignore_ascii_case(name)
    }

    /// Start watching a GitHub repository.
    pub fn add(&mut self, display_name: &str, url: &str) -> Result<&WatchedRepo> {
        let target = RepoTarget::from_github_url(display_name, url)?;

        if let Some(existing) = self.repos.iter().find(|r| {
            r.target.url == target.url
                || r.target.display_name == target.display_name
                || r.target.container_id() == target.container_id()
        }) {
            return Err(Error::Conflict(format!(
                "{} is already watched as {}",
                url, existing.target.display_name
            )));
        }

        self.repos.push(WatchedRepo::new(target));
        Ok(&self.repos[self.repos.len() - 1])
    }

    pub fn remove(&mut self, display_name: &str) -> Result<WatchedRepo> {
        let index = self
            .repos
            .iter()
            .position(|r| r.target.display_name == display_name)
            .ok_or_else(|| Error::NotFound(format!("{} is not watched", display_name)))?;
        Ok(self.repos.remove(index))
    }

    pub fn rename(&mut self, current: &str, new_name: &str) -> Result<()> {
        if self
            .repos
            .iter()
            .any(|r| r.target.display_name == new_name && r.target.display_name != current)
        {
            return Err(Error::Conflict(format!(
                "{} is already used for a different repo",
                new_name
            )));
        }

        let repo = self
            .repos
            .iter_mut()
            .find(|r| r.target.display_name == current)
            .ok_or_else(|| Error::NotFound(format!("{} is not watched", current)))?;
        repo.target.display_name = new_name.to_string();
        repo.stats.meta.last_modified_at = Some(Utc::now());
        Ok(())
    }

    /// Point an existing entry at a different repository URL.
    pub fn change_url(&mut self, display_name: &str, url: &str) -> Result<()> {
        if self
            .repos
            .iter()
            .any(|r| r.target.url == url && r.target.display_name != display_name)
        {
            return Err(Error::Conflict(format!(
                "{} is already watched under a different name",
                url
            )));
        }

        let target = RepoTarget::from_github_url(display_name, url)?;
        if let Some(other) = self.repos.iter().find(|r| {
            r.target.display_name != display_name && r.target.container_id() == target.container_id()
        }) {
            return Err(Error::Conflict(format!(
                "container {} already belongs to {}",
                target.container_id(),
                other.target.display_name
            )));
        }

        let repo = self
            .repos
            .iter_mut()
            .find(|r| r.target.display_name == display_name)
            .ok_or_else(|| Error::NotFound(format!("{} is not watched", display_name)))?;
        repo.target = target;
        repo.stats.meta.last_modified_at = Some(Utc::now());
        Ok(())
    }
}
