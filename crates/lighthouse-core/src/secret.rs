//! Secret storage abstraction.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::Result;

/// Distinct variable names a project needs from the secret store.
pub type SecretRequirement = BTreeSet<String>;

/// Trait for secret storage backends.
///
/// Lookups are by exact name. A missing secret must be reported as
/// [`crate::Error::NotFound`].
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<String>;
}

/// Secret values injected into a single build invocation.
///
/// Layered over the inherited process environment when the build tool is
/// spawned. Never serialized, and `Debug` prints names only.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ResolvedEnvironment {
    vars: BTreeMap<String, String>,
}

impl ResolvedEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl fmt::Debug for ResolvedEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.vars.keys().map(|k| (k, "***")))
            .finish()
    }
}
