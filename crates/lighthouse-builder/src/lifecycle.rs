//! Container lifecycle operations over watched targets.

use lighthouse_core::runtime::ContainerRuntime;
use lighthouse_core::{Error, RepoTarget, Result};
use tracing::{info, warn};

/// Stop the container from a previous build of `name`.
///
/// Returns whether something was stopped. A missing container is not an
/// error; any other failure is.
pub async fn stop_previous(runtime: &dyn ContainerRuntime, name: &str) -> Result<bool> {
    match runtime.stop(name).await {
        Ok(()) => {
            info!(container = %name, "Stopped previous container");
            Ok(true)
        }
        Err(Error::NotFound(_)) => {
            info!(container = %name, "No previous container to stop");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Start every target in order, stopping at the first failure.
pub async fn start_all(runtime: &dyn ContainerRuntime, targets: &[RepoTarget]) -> Result<()> {
    for target in targets {
        let name = target.container_id();
        runtime
            .start(&name)
            .await
            .map_err(|e| as_lifecycle(&name, "start", e))?;
    }
    Ok(())
}

/// Stop every target in order, stopping at the first failure.
pub async fn stop_all(runtime: &dyn ContainerRuntime, targets: &[RepoTarget]) -> Result<()> {
    for target in targets {
        let name = target.container_id();
        runtime
            .stop(&name)
            .await
            .map_err(|e| as_lifecycle(&name, "stop", e))?;
    }
    Ok(())
}

/// Start every target whose container is not already running.
///
/// Returns the names that were started.
pub async fn initialize_containers(
    runtime: &dyn ContainerRuntime,
    targets: &[RepoTarget],
) -> Result<Vec<String>> {
    let mut started = Vec::new();

    for target in targets {
        let name = target.container_id();
        if runtime.is_running(&name).await? {
            continue;
        }
        runtime
            .start(&name)
            .await
            .map_err(|e| as_lifecycle(&name, "start", e))?;
        started.push(name);
    }

    if !started.is_empty() {
        info!(count = started.len(), "Started watched containers");
    }
    Ok(started)
}

fn as_lifecycle(name: &str, action: &str, err: Error) -> Error {
    match err {
        Error::Lifecycle { .. } => err,
        other => {
            warn!(container = %name, error = %other, "Container {} failed", action);
            Error::Lifecycle {
                name: name.to_string(),
                message: format!("failed to {}: {}", action, other),
            }
        }
    }
}
