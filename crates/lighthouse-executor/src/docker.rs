//! Docker container runtime.

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{ListContainersOptions, StartContainerOptions};
use bollard::errors::Error as BollardError;
use lighthouse_core::runtime::{ContainerInfo, ContainerRuntime};
use lighthouse_core::{Error, Result};
use tracing::{debug, info};

/// Container lifecycle against the local Docker daemon.
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to the local Docker daemon.
    pub fn new() -> Result<Self> {
        let docker =
            Docker::connect_with_local_defaults().map_err(|e| Error::Internal(e.to_string()))?;
        Ok(Self { docker })
    }

    /// Create with a custom Docker client.
    pub fn with_client(docker: Docker) -> Self {
        Self { docker }
    }
}

/// Map a daemon error onto the lifecycle taxonomy.
///
/// 404 becomes [`Error::NotFound`]; everything else is fatal for the caller.
fn classify(name: &str, action: &str, err: BollardError) -> Error {
    match err {
        BollardError::DockerResponseServerError {
            status_code: 404,
            message,
        } => Error::NotFound(format!("no such container {}: {}", name, message)),
        other => Error::Lifecycle {
            name: name.to_string(),
            message: format!("failed to {}: {}", action, other),
        },
    }
}

/// The daemon answers 304 when the container is already in the requested state.
fn is_not_modified(err: &BollardError) -> bool {
    matches!(
        err,
        BollardError::DockerResponseServerError {
            status_code: 304,
            ..
        }
    )
}

fn summary_to_info(summary: bollard::models::ContainerSummary) -> ContainerInfo {
    let name = summary
        .names
        .as_ref()
        .and_then(|names| names.first())
        .map(|n| n.trim_start_matches('/').to_string())
        .unwrap_or_default();

    ContainerInfo {
        name,
        id: summary.id.unwrap_or_default(),
        image: summary.image.unwrap_or_default(),
        state: summary.state.unwrap_or_default(),
        status: summary.status.unwrap_or_default(),
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn start(&self, name: &str) -> Result<()> {
        info!(container = %name, "Starting container");
        match self
            .docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if is_not_modified(&e) => {
                debug!(container = %name, "Container already running");
                Ok(())
            }
            Err(e) => Err(classify(name, "start", e)),
        }
    }

    async fn stop(&self, name: &str) -> Result<()> {
        info!(container = %name, "Stopping container");
        match self.docker.stop_container(name, None).await {
            Ok(()) => Ok(()),
            Err(e) if is_not_modified(&e) => {
                debug!(container = %name, "Container already stopped");
                Ok(())
            }
            Err(e) => Err(classify(name, "stop", e)),
        }
    }

    async fn restart(&self, name: &str) -> Result<()> {
        info!(container = %name, "Restarting container");
        self.docker
            .restart_container(name, None)
            .await
            .map_err(|e| classify(name, "restart", e))
    }

    async fn is_running(&self, name: &str) -> Result<bool> {
        let inspect = match self.docker.inspect_container(name, None).await {
            Ok(inspect) => inspect,
            Err(e) => {
                return match classify(name, "inspect", e) {
                    Error::NotFound(_) => Ok(false),
                    other => Err(other),
                };
            }
        };

        let state = inspect.state.ok_or_else(|| Error::Lifecycle {
            name: name.to_string(),
            message: "no state reported".to_string(),
        })?;

        Ok(state.running.unwrap_or(false))
    }

    async fn list(&self, all: bool) -> Result<Vec<ContainerInfo>> {
        let options = ListContainersOptions::<String> {
            all,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| Error::Lifecycle {
                name: "*".to_string(),
                message: format!("failed to list containers: {}", e),
            })?;

        Ok(containers.into_iter().map(summary_to_info).collect())
    }
}
