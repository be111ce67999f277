//! Secret discovery and resolution for a staged project.

use lighthouse_config::find_placeholders;
use lighthouse_core::compose::ComposeTool;
use lighthouse_core::secret::{ResolvedEnvironment, SecretRequirement, SecretStore};
use lighthouse_core::{Error, Result};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Finds the variables a project references and fetches their values.
#[derive(Clone)]
pub struct SecretResolver {
    compose: Arc<dyn ComposeTool>,
    store: Option<Arc<dyn SecretStore>>,
}

impl SecretResolver {
    /// `store` may be `None` for hosts that build only secret-free projects.
    pub fn new(compose: Arc<dyn ComposeTool>, store: Option<Arc<dyn SecretStore>>) -> Self {
        Self { compose, store }
    }

    /// Render the project's manifest uninterpolated and collect every
    /// `${NAME}` it mentions.
    pub async fn discover(
        &self,
        project_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<SecretRequirement> {
        let manifest = self.compose.render_manifest(project_dir, cancel).await?;
        let names = find_placeholders(&manifest);
        info!(dir = %project_dir.display(), count = names.len(), "Discovered secret placeholders");
        Ok(names)
    }

    /// Look up every name. The first failure aborts resolution.
    pub async fn resolve(
        &self,
        names: &SecretRequirement,
        cancel: &CancellationToken,
    ) -> Result<ResolvedEnvironment> {
        let mut env = ResolvedEnvironment::new();
        if names.is_empty() {
            return Ok(env);
        }

        let store = self.store.as_ref().ok_or_else(|| Error::SecretResolution {
            name: names.iter().next().cloned().unwrap_or_default(),
            message: "no secret store configured".to_string(),
        })?;

        for name in names {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let value = store.get(name).await.map_err(|e| Error::SecretResolution {
                name: name.clone(),
                message: e.to_string(),
            })?;
            debug!(secret = %name, "Resolved secret");
            env.insert(name.clone(), value);
        }

        Ok(env)
    }
}
