//! Configuration for Lighthouse.
//!
//! This crate handles:
//! - System configuration (lighthouse.kdl)
//! - Placeholder discovery in compose manifests

pub mod error;
pub mod placeholders;
pub mod system;

pub use error::{ConfigError, ConfigResult};
pub use placeholders::find_placeholders;
pub use system::{
    BuildConfig, ComposeConfig, PathsConfig, SecretStoreConfig, SystemConfig, load_system_config,
    parse_system_config,
};
