//! Build pipeline - runs the stages for one repository in order.

use chrono::Utc;
use lighthouse_core::compose::ComposeTool;
use lighthouse_core::pipeline::{
    BuildReport, PipelineError, PipelineOutcome, RunState, Stage, StageTiming,
};
use lighthouse_core::runtime::ContainerRuntime;
use lighthouse_core::secret::SecretStore;
use lighthouse_core::{Error, RepoTarget, Result, RunId};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::extract::extract_archive;
use crate::fetch::ArchiveSource;
use crate::lifecycle::stop_previous;
use crate::secrets::SecretResolver;
use crate::workspace::Workspace;

/// Event emitted during a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    StageStarted { repo: String, stage: Stage },
    StageCompleted { repo: String, stage: Stage, success: bool },
    RunCompleted { repo: String, success: bool },
}

/// What the stages hand back for the report.
struct StageResults {
    stopped_previous: bool,
    secrets: Vec<String>,
}

/// A run's time limit. `expired` fires once the limit passes.
struct Deadline {
    limit: Duration,
    expired: CancellationToken,
}

/// Fetches, stages and rebuilds a repository's compose project.
///
/// Stages run strictly in order and the first failure ends the run. The
/// pipeline owns the workspace, so runs on one pipeline are serialized.
pub struct BuildPipeline {
    workspace: Workspace,
    fetcher: Arc<dyn ArchiveSource>,
    runtime: Arc<dyn ContainerRuntime>,
    compose: Arc<dyn ComposeTool>,
    secrets: SecretResolver,
    timeout: Option<Duration>,
    deadline: Option<Deadline>,
    events: Option<mpsc::Sender<PipelineEvent>>,
    state: RunState,
    timings: Vec<StageTiming>,
}

impl BuildPipeline {
    pub fn new(
        workspace: Workspace,
        fetcher: Arc<dyn ArchiveSource>,
        runtime: Arc<dyn ContainerRuntime>,
        compose: Arc<dyn ComposeTool>,
        store: Option<Arc<dyn SecretStore>>,
    ) -> Self {
        let secrets = SecretResolver::new(compose.clone(), store);
        Self {
            workspace,
            fetcher,
            runtime,
            compose,
            secrets,
            timeout: None,
            deadline: None,
            events: None,
            state: RunState::Idle,
            timings: Vec::new(),
        }
    }

    /// Fail runs that take longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send progress events to `tx`. The receiver must keep up; sends wait
    /// for capacity.
    pub fn with_events(mut self, tx: mpsc::Sender<PipelineEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Run every stage for `target`.
    pub async fn run(&mut self, target: &RepoTarget, cancel: &CancellationToken) -> PipelineOutcome {
        let run_id = RunId::new();
        let started_at = Utc::now();
        let repo = target.display_name.clone();
        self.timings.clear();

        info!(run_id = %run_id, repo = %repo, url = %target.download_url, "Starting build");

        // The timer cancels a child token, so an expired run unwinds through
        // the same cancellation path as an interrupted one.
        let run_cancel = cancel.child_token();
        let timer = self.timeout.map(|limit| {
            let expired = CancellationToken::new();
            self.deadline = Some(Deadline {
                limit,
                expired: expired.clone(),
            });
            let run_cancel = run_cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                expired.cancel();
                run_cancel.cancel();
            })
        });

        let result = self.run_stages(target, &run_cancel).await;

        if let Some(timer) = timer {
            timer.abort();
        }
        self.deadline = None;

        let success = result.is_ok();
        self.emit(PipelineEvent::RunCompleted {
            repo: repo.clone(),
            success,
        })
        .await;

        let results = result?;
        self.state = RunState::Done;

        let report = BuildReport {
            run_id,
            repo,
            started_at,
            finished_at: Utc::now(),
            stopped_previous: results.stopped_previous,
            secrets: results.secrets,
            stages: std::mem::take(&mut self.timings),
        };
        info!(
            run_id = %report.run_id,
            repo = %report.repo,
            secrets = report.secrets.len(),
            "Build completed"
        );
        Ok(report)
    }

    async fn run_stages(
        &mut self,
        target: &RepoTarget,
        cancel: &CancellationToken,
    ) -> std::result::Result<StageResults, PipelineError> {
        let repo = target.display_name.as_str();
        let container = target.container_id();

        let started = self.enter(repo, Stage::Cleaning).await;
        let result = guarded(cancel, self.workspace.clean()).await;
        self.leave(repo, Stage::Cleaning, started, result).await?;

        let started = self.enter(repo, Stage::Fetching).await;
        let result = guarded(
            cancel,
            self.fetcher.fetch(
                &target.download_url,
                self.workspace.download_dir(),
                &target.container_name,
                cancel,
            ),
        )
        .await;
        let archive = self.leave(repo, Stage::Fetching, started, result).await?;

        let started = self.enter(repo, Stage::StoppingPrevious).await;
        let result = guarded(cancel, stop_previous(self.runtime.as_ref(), &container)).await;
        let stopped_previous = self
            .leave(repo, Stage::StoppingPrevious, started, result)
            .await?;

        // Not guarded: extraction observes `cancel` and must stop writing
        // before the stage can end.
        let started = self.enter(repo, Stage::Extracting).await;
        let result = async {
            extract_archive(&archive, self.workspace.staging_dir(), cancel).await?;
            self.workspace.project_dir(&target.container_name).await
        }
        .await;
        let project_dir = self.leave(repo, Stage::Extracting, started, result).await?;

        let started = self.enter(repo, Stage::DiscoveringSecrets).await;
        let result = guarded(cancel, self.secrets.discover(&project_dir, cancel)).await;
        let names = self
            .leave(repo, Stage::DiscoveringSecrets, started, result)
            .await?;

        let started = self.enter(repo, Stage::ResolvingSecrets).await;
        let result = guarded(cancel, self.secrets.resolve(&names, cancel)).await;
        let env = self
            .leave(repo, Stage::ResolvingSecrets, started, result)
            .await?;

        let started = self.enter(repo, Stage::Building).await;
        let result = guarded(cancel, self.compose.build_project(&project_dir, &env, cancel)).await;
        self.leave(repo, Stage::Building, started, result).await?;

        let started = self.enter(repo, Stage::FinalCleaning).await;
        let result = guarded(cancel, self.workspace.clean()).await;
        self.leave(repo, Stage::FinalCleaning, started, result)
            .await?;

        Ok(StageResults {
            stopped_previous,
            secrets: names.into_iter().collect(),
        })
    }

    async fn enter(&mut self, repo: &str, stage: Stage) -> Instant {
        info!(repo = %repo, stage = %stage, "Stage started");
        self.state = RunState::Running(stage);
        self.emit(PipelineEvent::StageStarted {
            repo: repo.to_string(),
            stage,
        })
        .await;
        Instant::now()
    }

    async fn leave<T>(
        &mut self,
        repo: &str,
        stage: Stage,
        started: Instant,
        result: Result<T>,
    ) -> std::result::Result<T, PipelineError> {
        match result {
            Ok(value) => {
                let duration = started.elapsed();
                info!(repo = %repo, stage = %stage, ?duration, "Stage completed");
                self.timings.push(StageTiming { stage, duration });
                self.emit(PipelineEvent::StageCompleted {
                    repo: repo.to_string(),
                    stage,
                    success: true,
                })
                .await;
                Ok(value)
            }
            Err(e) => Err(self.fail(repo, stage, e).await),
        }
    }

    async fn fail(&mut self, repo: &str, stage: Stage, err: Error) -> PipelineError {
        let err = match &self.deadline {
            Some(deadline)
                if deadline.expired.is_cancelled() && matches!(err, Error::Cancelled) =>
            {
                Error::Timeout(format!("run exceeded {:?}", deadline.limit))
            }
            _ => err,
        };
        error!(repo = %repo, stage = %stage, error = %err, "Stage failed");
        self.state = RunState::Failed {
            stage,
            message: err.to_string(),
        };
        self.emit(PipelineEvent::StageCompleted {
            repo: repo.to_string(),
            stage,
            success: false,
        })
        .await;
        PipelineError::new(stage, repo, err)
    }

    async fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }
}

/// Run `fut` unless `cancel` fires first.
async fn guarded<T>(cancel: &CancellationToken, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}
