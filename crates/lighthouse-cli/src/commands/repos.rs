//! Watch list commands.

use anyhow::{Context, Result};
use lighthouse_config::SystemConfig;

use super::open_watchlist;

pub fn list(config: &SystemConfig) -> Result<()> {
    let watchlist = open_watchlist(config)?;

    if watchlist.repos().is_empty() {
        println!("No repositories watched");
        return Ok(());
    }

    println!("{:<20} {:<20} {:<10} {}", "NAME", "CONTAINER", "LAST BUILD", "URL");
    for repo in watchlist.repos() {
        let last_build = repo
            .stats
            .builds
            .last_build_status
            .as_deref()
            .unwrap_or("never");
        println!(
            "{:<20} {:<20} {:<10} {}",
            repo.target.display_name,
            repo.target.container_id(),
            last_build,
            repo.target.url
        );
    }
    Ok(())
}

pub fn add(config: &SystemConfig, display_name: &str, url: &str) -> Result<()> {
    let mut watchlist = open_watchlist(config)?;
    let container = watchlist
        .add(display_name, url)
        .with_context(|| format!("Failed to add {}", url))?
        .target
        .container_id();
    watchlist.save().context("Failed to save watch list")?;
    println!("✓ watching {} as {} (container {})", url, display_name, container);
    Ok(())
}

pub fn remove(config: &SystemConfig, display_name: &str) -> Result<()> {
    let mut watchlist = open_watchlist(config)?;
    let removed = watchlist
        .remove(display_name)
        .with_context(|| format!("Failed to remove {}", display_name))?;
    watchlist.save().context("Failed to save watch list")?;
    println!("✓ no longer watching {}", removed.target.url);
    Ok(())
}

pub fn rename(config: &SystemConfig, current: &str, new_name: &str) -> Result<()> {
    let mut watchlist = open_watchlist(config)?;
    watchlist
        .rename(current, new_name)
        .with_context(|| format!("Failed to rename {}", current))?;
    watchlist.save().context("Failed to save watch list")?;
    println!("✓ renamed {} to {}", current, new_name);
    Ok(())
}

pub fn set_url(config: &SystemConfig, display_name: &str, url: &str) -> Result<()> {
    let mut watchlist = open_watchlist(config)?;
    watchlist
        .change_url(display_name, url)
        .with_context(|| format!("Failed to change URL of {}", display_name))?;
    watchlist.save().context("Failed to save watch list")?;
    println!("✓ {} now builds from {}", display_name, url);
    Ok(())
}
