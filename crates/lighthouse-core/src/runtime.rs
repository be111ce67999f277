//! Container runtime trait.
//!
//! Containers are addressed by name only. Nothing here caches state; every
//! call goes back to the runtime.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Snapshot of a container as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    /// Primary name, without the leading `/` Docker reports.
    pub name: String,
    pub id: String,
    pub image: String,
    /// Machine state, e.g. `running` or `exited`.
    pub state: String,
    /// Human readable status, e.g. `Up 2 hours`.
    pub status: String,
}

impl ContainerInfo {
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

/// Trait for container lifecycle backends.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Name of this runtime.
    fn name(&self) -> &'static str;

    /// Start a container. Fails with [`crate::Error::NotFound`] if it does not exist.
    async fn start(&self, name: &str) -> Result<()>;

    /// Stop a container. Fails with [`crate::Error::NotFound`] if it does not exist.
    async fn stop(&self, name: &str) -> Result<()>;

    async fn restart(&self, name: &str) -> Result<()>;

    /// Whether the container is running. A missing container is `Ok(false)`.
    async fn is_running(&self, name: &str) -> Result<bool>;

    /// List containers; `all` includes stopped ones.
    async fn list(&self, all: bool) -> Result<Vec<ContainerInfo>>;
}
