//! Container commands.

use anyhow::{Context, Result};
use lighthouse_builder::lifecycle;
use lighthouse_config::SystemConfig;
use lighthouse_core::RepoTarget;
use lighthouse_core::runtime::ContainerRuntime;

use super::{docker, find_target, open_watchlist};

/// Resolve `name` to targets; `all` means every watched repository.
fn targets(config: &SystemConfig, name: &str) -> Result<Vec<RepoTarget>> {
    let watchlist = open_watchlist(config)?;
    if name.eq_ignore_ascii_case("all") {
        Ok(watchlist.targets())
    } else {
        Ok(vec![find_target(&watchlist, name)?])
    }
}

pub async fn start(config: &SystemConfig, name: &str) -> Result<()> {
    let targets = targets(config, name)?;
    lifecycle::start_all(&docker()?, &targets)
        .await
        .context("Failed to start containers")?;
    for target in &targets {
        println!("✓ started {}", target.container_id());
    }
    Ok(())
}

pub async fn stop(config: &SystemConfig, name: &str) -> Result<()> {
    let targets = targets(config, name)?;
    lifecycle::stop_all(&docker()?, &targets)
        .await
        .context("Failed to stop containers")?;
    for target in &targets {
        println!("✓ stopped {}", target.container_id());
    }
    Ok(())
}

pub async fn restart(config: &SystemConfig, name: &str) -> Result<()> {
    let target = find_target(&open_watchlist(config)?, name)?;
    let container = target.container_id();
    docker()?
        .restart(&container)
        .await
        .with_context(|| format!("Failed to restart {}", container))?;
    println!("✓ restarted {}", container);
    Ok(())
}

pub async fn status(config: &SystemConfig, name: &str) -> Result<()> {
    let target = find_target(&open_watchlist(config)?, name)?;
    let container = target.container_id();
    let running = docker()?
        .is_running(&container)
        .await
        .with_context(|| format!("Failed to inspect {}", container))?;
    println!(
        "{}: {}",
        container,
        if running { "running" } else { "not running" }
    );
    Ok(())
}

pub async fn ps(all: bool) -> Result<()> {
    let containers = docker()?.list(all).await.context("Failed to list containers")?;

    println!("{:<30} {:<12} {:<30} {}", "NAME", "STATE", "IMAGE", "STATUS");
    for c in containers {
        println!("{:<30} {:<12} {:<30} {}", c.name, c.state, c.image, c.status);
    }
    Ok(())
}

pub async fn init(config: &SystemConfig) -> Result<()> {
    let watchlist = open_watchlist(config)?;
    let started = lifecycle::initialize_containers(&docker()?, &watchlist.targets())
        .await
        .context("Failed to initialize containers")?;

    if started.is_empty() {
        println!("All watched containers are running");
    }
    for name in started {
        println!("✓ started {}", name);
    }
    Ok(())
}
