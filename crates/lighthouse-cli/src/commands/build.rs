//! Build and workspace commands.

use anyhow::{Context, Result};
use chrono::Utc;
use lighthouse_builder::{BuildPipeline, HttpFetcher, PipelineEvent, Workspace};
use lighthouse_config::SystemConfig;
use lighthouse_core::pipeline::{PipelineError, PipelineOutcome, Stage};
use lighthouse_core::secret::SecretStore;
use lighthouse_executor::{ComposeCli, HttpSecretStore};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{docker, find_target, open_watchlist};

/// Run the build pipeline for one watched repository.
pub async fn build(config: &SystemConfig, name: &str) -> Result<()> {
    let mut watchlist = open_watchlist(config)?;
    let target = find_target(&watchlist, name)?;

    let workspace = Workspace::from_config(&config.paths).context("Invalid workspace paths")?;
    let store = config.secrets.as_ref().map(|secrets| {
        Arc::new(HttpSecretStore::new(&secrets.url, secrets.token())) as Arc<dyn SecretStore>
    });
    let compose = ComposeCli::new(&config.compose.program, config.compose.args.clone());

    let (tx, mut rx) = mpsc::channel(100);
    let mut pipeline = BuildPipeline::new(
        workspace,
        Arc::new(HttpFetcher::new()),
        Arc::new(docker()?),
        Arc::new(compose),
        store,
    )
    .with_timeout(config.build.timeout)
    .with_events(tx);

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event);
        }
    });

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("Interrupted, cancelling build...");
            on_interrupt.cancel();
        }
    });

    println!("Building {} from {}", target.display_name, target.download_url);
    let outcome = pipeline.run(&target, &cancel).await;

    // Closing the channel ends the printer.
    drop(pipeline);
    let _ = printer.await;

    let (status, downloaded) = build_status(&outcome);
    if let Some(repo) = watchlist.find_mut(name) {
        repo.record_build(Utc::now(), &status, downloaded);
    }
    if let Err(e) = watchlist.save() {
        warn!(error = %e, "Failed to record build statistics");
    }

    let report = outcome?;
    println!(
        "\n✓ {} built in {} stages ({} secrets, previous container {})",
        report.repo,
        report.stages.len(),
        report.secrets.len(),
        if report.stopped_previous {
            "stopped"
        } else {
            "not found"
        }
    );
    Ok(())
}

/// The status recorded for a run, and whether its archive was downloaded.
fn build_status(outcome: &PipelineOutcome) -> (String, bool) {
    match outcome {
        Ok(_) => ("success".to_string(), true),
        Err(e) => (format!("failed: {}", e.stage), fetched(e)),
    }
}

/// Whether the archive had been downloaded when the run failed.
fn fetched(err: &PipelineError) -> bool {
    !matches!(err.stage, Stage::Cleaning | Stage::Fetching)
}

fn print_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::StageStarted { stage, .. } => {
            println!("▶ {}", stage);
        }
        PipelineEvent::StageCompleted { stage, success, .. } => {
            if *success {
                println!("✓ {}", stage);
            } else {
                println!("✗ {}", stage);
            }
        }
        PipelineEvent::RunCompleted { repo, success } => {
            if *success {
                println!("--- {} build succeeded ---", repo);
            } else {
                println!("--- {} build failed ---", repo);
            }
        }
    }
}

/// Empty the download and staging areas.
pub async fn clean(config: &SystemConfig) -> Result<()> {
    let workspace = Workspace::from_config(&config.paths).context("Invalid workspace paths")?;
    workspace
        .clean()
        .await
        .context("Failed to clean workspace")?;
    println!(
        "Cleaned {} and {}",
        workspace.download_dir().display(),
        workspace.staging_dir().display()
    );
    Ok(())
}
