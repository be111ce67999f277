//! CLI command implementations.

pub mod build;
pub mod containers;
pub mod repos;

use anyhow::{Context, Result};
use lighthouse_config::{SystemConfig, load_system_config};
use lighthouse_core::RepoTarget;
use lighthouse_core::watchlist::WatchList;
use lighthouse_executor::DockerRuntime;
use std::path::{Path, PathBuf};

/// Load the system configuration, applying path overrides from the command line.
pub fn load_config(
    path: &Path,
    download_dir: Option<PathBuf>,
    staging_dir: Option<PathBuf>,
) -> Result<SystemConfig> {
    let mut config = load_system_config(path)
        .with_context(|| format!("Failed to load config file: {}", path.display()))?;

    if let Some(dir) = download_dir {
        config.paths.download = dir;
    }
    if let Some(dir) = staging_dir {
        config.paths.staging = dir;
    }

    Ok(config)
}

pub fn open_watchlist(config: &SystemConfig) -> Result<WatchList> {
    WatchList::load(&config.paths.watchlist).with_context(|| {
        format!(
            "Failed to load watch list: {}",
            config.paths.watchlist.display()
        )
    })
}

/// Find a watched repository by display or container name.
pub fn find_target(watchlist: &WatchList, name: &str) -> Result<RepoTarget> {
    watchlist
        .find(name)
        .map(|repo| repo.target.clone())
        .with_context(|| format!("No watched repository named {}", name))
}

pub fn docker() -> Result<DockerRuntime> {
    DockerRuntime::new().context("Failed to connect to Docker")
}
