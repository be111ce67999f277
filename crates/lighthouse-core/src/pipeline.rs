//! Build pipeline stages and outcomes.

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::{Error, RunId};

/// A step of a pipeline run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[display("cleaning")]
    Cleaning,
    #[display("fetching")]
    Fetching,
    #[display("stopping previous")]
    StoppingPrevious,
    #[display("extracting")]
    Extracting,
    #[display("discovering secrets")]
    DiscoveringSecrets,
    #[display("resolving secrets")]
    ResolvingSecrets,
    #[display("building")]
    Building,
    #[display("final cleaning")]
    FinalCleaning,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Cleaning,
        Stage::Fetching,
        Stage::StoppingPrevious,
        Stage::Extracting,
        Stage::DiscoveringSecrets,
        Stage::ResolvingSecrets,
        Stage::Building,
        Stage::FinalCleaning,
    ];

    /// The stage that follows this one, or `None` after the last.
    pub fn next(self) -> Option<Stage> {
        let index = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(index + 1).copied()
    }
}

/// Where a pipeline is in its state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Running(Stage),
    Done,
    Failed { stage: Stage, message: String },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed { .. })
    }
}

/// A failed pipeline run: the stage, the repository and the cause.
#[derive(Debug, Error)]
#[error("{repo}: {stage} failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    pub repo: String,
    #[source]
    pub source: Error,
}

impl PipelineError {
    pub fn new(stage: Stage, repo: impl Into<String>, source: Error) -> Self {
        Self {
            stage,
            repo: repo.into(),
            source,
        }
    }
}

/// How long a stage took.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub duration: Duration,
}

/// Summary of a successful pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub run_id: RunId,
    pub repo: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Whether a previous container was stopped before rebuilding.
    pub stopped_previous: bool,
    /// Names of the secrets injected into the build.
    pub secrets: Vec<String>,
    pub stages: Vec<StageTiming>,
}

pub type PipelineOutcome = std::result::Result<BuildReport, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        let mut stage = Stage::Cleaning;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            seen.push(next);
            stage = next;
        }
        assert_eq!(seen, Stage::ALL.to_vec());
    }

    #[test]
    fn test_pipeline_error_display() {
        let err = PipelineError::new(
            Stage::Extracting,
            "blog",
            Error::Security("../etc/passwd escapes staging".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "blog: extracting failed: security violation: ../etc/passwd escapes staging"
        );
        assert!(err.source.is_security());
    }

    #[test]
    fn test_run_state_terminal() {
        assert!(!RunState::Idle.is_terminal());
        assert!(!RunState::Running(Stage::Building).is_terminal());
        assert!(RunState::Done.is_terminal());
        assert!(
            RunState::Failed {
                stage: Stage::Fetching,
                message: "boom".to_string()
            }
            .is_terminal()
        );
    }
}
