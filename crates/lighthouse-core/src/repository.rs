//! Watched repository types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const GITHUB_PREFIX: &str = "https://github.com/";

/// A buildable unit: one upstream repository mapped to one compose project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoTarget {
    /// Name shown to operators.
    pub display_name: String,
    /// Repository name; doubles as the container and compose project name.
    pub container_name: String,
    /// Source repository URL.
    pub url: String,
    /// GitHub REST endpoint for the repository.
    #[serde(rename = "apiURL")]
    pub api_url: String,
    /// Branch archive URL fetched on every build.
    #[serde(rename = "downloadURL")]
    pub download_url: String,
}

impl RepoTarget {
    /// Derive a target from a `https://github.com/<owner>/<repo>` URL.
    pub fn from_github_url(display_name: impl Into<String>, url: &str) -> Result<Self> {
        let trimmed = url
            .strip_prefix(GITHUB_PREFIX)
            .ok_or_else(|| Error::InvalidInput(format!("invalid GitHub repo URL: {}", url)))?;
        let trimmed = trimmed.trim_end_matches('/');
        let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

        let parts: Vec<&str> = trimmed.split('/').collect();
        let [owner, name] = parts.as_slice() else {
            return Err(Error::InvalidInput(format!(
                "invalid GitHub repo URL: {}",
                url
            )));
        };
        if owner.is_empty() || name.is_empty() {
            return Err(Error::InvalidInput(format!(
                "invalid GitHub repo URL: {}",
                url
            )));
        }

        Ok(Self {
            display_name: display_name.into(),
            container_name: name.to_string(),
            url: url.to_string(),
            api_url: format!("https://api.github.com/repos/{}/{}", owner, name),
            download_url: format!(
                "https://github.com/{}/{}/archive/refs/heads/main.zip",
                owner, name
            ),
        })
    }

    /// Name used for container runtime calls.
    pub fn container_id(&self) -> String {
        self.container_name.to_lowercase()
    }
}

/// A watch list entry: the target plus its bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchedRepo {
    #[serde(flatten)]
    pub target: RepoTarget,
    pub stats: RepoStats,
}

impl WatchedRepo {
    pub fn new(target: RepoTarget) -> Self {
        Self {
            target,
            stats: RepoStats::new(Utc::now()),
        }
    }

    /// Record the outcome of a pipeline run.
    pub fn record_build(&mut self, at: DateTime<Utc>, status: &str, downloaded: bool) {
        self.stats.builds.last_build_at = Some(at);
        self.stats.builds.last_build_status = Some(status.to_string());
        self.stats.builds.build_triggered_count += 1;

        self.stats.downloads.download_triggered_count += 1;
        self.stats.downloads.last_download_at = Some(at);
        self.stats.downloads.last_download_status = Some(
            if downloaded { "success" } else { "failed" }.to_string(),
        );
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoStats {
    pub meta: MetaStats,
    pub queries: QueryStats,
    pub updates: UpdateStats,
    pub builds: BuildStats,
    pub downloads: DownloadStats,
}

impl RepoStats {
    pub fn new(started_watching_at: DateTime<Utc>) -> Self {
        Self {
            meta: MetaStats {
                started_watching_at,
                last_modified_at: None,
            },
            queries: QueryStats::default(),
            updates: UpdateStats::default(),
            builds: BuildStats::default(),
            downloads: DownloadStats::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaStats {
    pub started_watching_at: DateTime<Utc>,
    pub last_modified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStats {
    pub last_queried_at: Option<DateTime<Utc>>,
    pub query_count: u64,
    pub last_error_at: Option<DateTime<Utc>>,
    pub last_error_message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStats {
    pub last_updated_at: Option<DateTime<Utc>>,
    pub last_seen_commit_sha: Option<String>,
    pub last_seen_tag: Option<String>,
    pub update_count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStats {
    pub last_build_at: Option<DateTime<Utc>>,
    pub last_build_status: Option<String>,
    pub build_triggered_count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadStats {
    pub last_download_at: Option<DateTime<Utc>>,
    pub last_download_status: Option<String>,
    pub download_triggered_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_github_url() {
        let target =
            RepoTarget::from_github_url("Blog", "https://github.com/acme/BlogEngine").unwrap();

        assert_eq!(target.display_name, "Blog");
        assert_eq!(target.container_name, "BlogEngine");
        assert_eq!(target.api_url, "https://api.github.com/repos/acme/BlogEngine");
        assert_eq!(
            target.download_url,
            "https://github.com/acme/BlogEngine/archive/refs/heads/main.zip"
        );
        assert_eq!(target.container_id(), "blogengine");
    }

    #[test]
    fn test_from_github_url_tolerates_git_suffix() {
        let target = RepoTarget::from_github_url("x", "https://github.com/acme/site.git/").unwrap();
        assert_eq!(target.container_name, "site");
    }

    #[test]
    fn test_from_github_url_rejects_other_shapes() {
        for url in [
            "https://gitlab.com/acme/site",
            "https://github.com/acme",
            "https://github.com/acme/site/tree/main",
            "https://github.com//site",
        ] {
            let err = RepoTarget::from_github_url("x", url).unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "{url}");
        }
    }

    #[test]
    fn test_watched_repo_json_shape() {
        let target = RepoTarget::from_github_url("Blog", "https://github.com/acme/blog").unwrap();
        let repo = WatchedRepo::new(target);
        let json = serde_json::to_value(&repo).unwrap();

        assert_eq!(json["displayName"], "Blog");
        assert_eq!(json["containerName"], "blog");
        assert_eq!(json["apiURL"], "https://api.github.com/repos/acme/blog");
        assert!(json["stats"]["meta"]["startedWatchingAt"].is_string());
        assert_eq!(json["stats"]["builds"]["buildTriggeredCount"], 0);
    }

    #[test]
    fn test_record_build() {
        let target = RepoTarget::from_github_url("Blog", "https://github.com/acme/blog").unwrap();
        let mut repo = WatchedRepo::new(target);
        let now = Utc::now();

        repo.record_build(now, "failed: fetching", false);

        assert_eq!(repo.stats.builds.build_triggered_count, 1);
        assert_eq!(
            repo.stats.builds.last_build_status.as_deref(),
            Some("failed: fetching")
        );
        assert_eq!(
            repo.stats.downloads.last_download_status.as_deref(),
            Some("failed")
        );
    }
}
