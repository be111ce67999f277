//! Error types for Lighthouse.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("workspace error: {0}")]
    Workspace(String),

    #[error("transfer failed: {0}")]
    Transfer(String),

    /// An archive entry tried to escape the staging area.
    #[error("security violation: {0}")]
    Security(String),

    #[error("extraction failed: {0}")]
    Extraction(String),

    /// The manifest render command failed; `output` holds what it printed.
    #[error("secret discovery failed: {message}\n{output}")]
    SecretDiscovery { message: String, output: String },

    #[error("missing value for {name:?}: {message}")]
    SecretResolution { name: String, message: String },

    #[error("container {name}: {message}")]
    Lifecycle { name: String, message: String },

    #[error("build failed: {0}")]
    Build(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub fn is_security(&self) -> bool {
        matches!(self, Error::Security(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
