//! Backends for Lighthouse.
//!
//! Provides implementations of the core seams:
//! - Docker container runtime
//! - Compose CLI driver
//! - HTTP secret store

pub mod compose;
pub mod docker;
pub mod secrets;

pub use compose::ComposeCli;
pub use docker::DockerRuntime;
pub use secrets::HttpSecretStore;
