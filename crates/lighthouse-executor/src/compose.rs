//! Compose CLI driver.

use async_trait::async_trait;
use lighthouse_core::compose::ComposeTool;
use lighthouse_core::secret::ResolvedEnvironment;
use lighthouse_core::{Error, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Runs the compose tool as a subprocess.
///
/// `program` and `args` form the command prefix, e.g. `docker` and
/// `["compose"]`; subcommands are appended after them.
pub struct ComposeCli {
    program: String,
    args: Vec<String>,
}

impl Default for ComposeCli {
    fn default() -> Self {
        Self::new("docker", vec!["compose".to_string()])
    }
}

impl ComposeCli {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn command(&self, project_dir: &Path, subcommand: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .args(subcommand)
            .current_dir(project_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ComposeTool for ComposeCli {
    async fn render_manifest(
        &self,
        project_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<String> {
        info!(dir = %project_dir.display(), "Rendering compose manifest");

        let mut cmd = self.command(project_dir, &["config", "--no-interpolate"]);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            output = cmd.output() => output.map_err(|e| Error::SecretDiscovery {
                message: format!("failed to run {}: {}", self.program, e),
                output: String::new(),
            })?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = format!("{}{}", stdout, stderr);

        if !output.status.success() {
            error!(output = %combined, "Compose config failed");
            return Err(Error::SecretDiscovery {
                message: format!("{} config exited with {}", self.program, output.status),
                output: combined,
            });
        }

        Ok(combined)
    }

    async fn build_project(
        &self,
        project_dir: &Path,
        env: &ResolvedEnvironment,
        cancel: &CancellationToken,
    ) -> Result<()> {
        info!(
            dir = %project_dir.display(),
            secrets = env.len(),
            "Building compose project"
        );

        let mut child = self
            .command(project_dir, &["up", "-d", "--build", "--remove-orphans"])
            .envs(env.iter())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::Build(format!("failed to run {}: {}", self.program, e)))?;

        // Dropping the child on cancellation kills it.
        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            status = child.wait() => status
                .map_err(|e| Error::Build(format!("failed to wait for {}: {}", self.program, e)))?,
        };

        if !status.success() {
            return Err(Error::Build(format!(
                "{} up exited with {}",
                self.program, status
            )));
        }

        info!(dir = %project_dir.display(), "Compose project is up");
        Ok(())
    }
}
