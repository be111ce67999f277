//! Orchestration tool seam.

use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::secret::ResolvedEnvironment;

/// Drives the compose tool for a staged project directory.
#[async_trait]
pub trait ComposeTool: Send + Sync {
    /// Render the project's manifest without interpolating variables.
    ///
    /// Returns the tool's output. A failed render is
    /// [`crate::Error::SecretDiscovery`] carrying whatever the tool printed.
    async fn render_manifest(
        &self,
        project_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<String>;

    /// Build images and bring the project up, removing orphaned services.
    ///
    /// `env` is layered over the inherited process environment.
    async fn build_project(
        &self,
        project_dir: &Path,
        env: &ResolvedEnvironment,
        cancel: &CancellationToken,
    ) -> Result<()>;
}
