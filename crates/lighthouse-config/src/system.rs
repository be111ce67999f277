//! System configuration parsing.

use crate::{ConfigError, ConfigResult};
use kdl::{KdlDocument, KdlNode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// System-wide configuration, built once at startup and passed by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    pub paths: PathsConfig,
    /// Secret store configuration. Without one, projects that need secrets
    /// fail to build.
    pub secrets: Option<SecretStoreConfig>,
    pub compose: ComposeConfig,
    pub build: BuildConfig,
}

/// Scratch and persistence locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Where archives are downloaded.
    pub download: PathBuf,
    /// Where archives are extracted and built from.
    pub staging: PathBuf,
    /// JSON file holding the watch list.
    pub watchlist: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretStoreConfig {
    pub url: String,
    /// Environment variable holding the bearer token, if any.
    pub token_env: Option<String>,
}

impl SecretStoreConfig {
    /// Read the token from the configured environment variable.
    pub fn token(&self) -> Option<String> {
        self.token_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeConfig {
    pub program: String,
    /// Arguments placed before the compose subcommand.
    pub args: Vec<String>,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            program: "docker".to_string(),
            args: vec!["compose".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Upper bound on a whole pipeline run.
    pub timeout: Option<Duration>,
}

/// Read and parse a system configuration file.
pub fn load_system_config(path: &Path) -> ConfigResult<SystemConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_system_config(&content)
}

/// Parse system configuration from KDL text.
pub fn parse_system_config(kdl: &str) -> ConfigResult<SystemConfig> {
    let doc: KdlDocument = kdl.parse()?;

    let mut paths = None;
    let mut secrets = None;
    let mut compose = None;
    let mut build = None;

    for node in doc.nodes() {
        match node.name().value() {
            "paths" => set_once(&mut paths, "paths", parse_paths(node)?)?,
            "secrets" => set_once(&mut secrets, "secrets", parse_secrets(node)?)?,
            "compose" => set_once(&mut compose, "compose", parse_compose(node)?)?,
            "build" => set_once(&mut build, "build", parse_build(node)?)?,
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(SystemConfig {
        paths: paths.ok_or_else(|| ConfigError::MissingField("paths".to_string()))?,
        secrets,
        compose: compose.unwrap_or_default(),
        build: build.unwrap_or_default(),
    })
}

fn set_once<T>(slot: &mut Option<T>, name: &str, value: T) -> ConfigResult<()> {
    if slot.is_some() {
        return Err(ConfigError::Duplicate(name.to_string()));
    }
    *slot = Some(value);
    Ok(())
}

fn parse_paths(node: &KdlNode) -> ConfigResult<PathsConfig> {
    let mut download = None;
    let mut staging = None;
    let mut watchlist = None;

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "download" => download = non_empty_string_arg(child, "paths.download")?,
                "staging" => staging = non_empty_string_arg(child, "paths.staging")?,
                "watchlist" => watchlist = non_empty_string_arg(child, "paths.watchlist")?,
                _ => {}
            }
        }
    }

    Ok(PathsConfig {
        download: download
            .map(PathBuf::from)
            .ok_or_else(|| ConfigError::MissingField("paths.download".to_string()))?,
        staging: staging
            .map(PathBuf::from)
            .ok_or_else(|| ConfigError::MissingField("paths.staging".to_string()))?,
        watchlist: watchlist
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("repos.json")),
    })
}

fn parse_secrets(node: &KdlNode) -> ConfigResult<SecretStoreConfig> {
    let mut url = None;
    let mut token_env = None;

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "url" => url = non_empty_string_arg(child, "secrets.url")?,
                "token-env" | "token_env" => token_env = get_first_string_arg(child),
                _ => {}
            }
        }
    }

    Ok(SecretStoreConfig {
        url: url.ok_or_else(|| ConfigError::MissingField("secrets.url".to_string()))?,
        token_env,
    })
}

fn parse_compose(node: &KdlNode) -> ConfigResult<ComposeConfig> {
    let mut config = ComposeConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "program" => {
                    if let Some(program) = non_empty_string_arg(child, "compose.program")? {
                        config.program = program;
                    }
                }
                "args" => config.args = get_all_string_args(child),
                _ => {}
            }
        }
    }

    Ok(config)
}

fn parse_build(node: &KdlNode) -> ConfigResult<BuildConfig> {
    let mut config = BuildConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            if matches!(child.name().value(), "timeout-secs" | "timeout_secs") {
                let secs = get_first_integer_arg(child).ok_or_else(|| {
                    ConfigError::InvalidValue {
                        field: "build.timeout-secs".to_string(),
                        message: "expected an integer".to_string(),
                    }
                })?;
                let secs = u64::try_from(secs).map_err(|_| ConfigError::InvalidValue {
                    field: "build.timeout-secs".to_string(),
                    message: format!("{} is out of range", secs),
                })?;
                // Zero disables the timeout.
                config.timeout = (secs > 0).then(|| Duration::from_secs(secs));
            }
        }
    }

    Ok(config)
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn non_empty_string_arg(node: &KdlNode, field: &str) -> ConfigResult<Option<String>> {
    match get_first_string_arg(node) {
        Some(value) if value.trim().is_empty() => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            message: "must not be empty".to_string(),
        }),
        other => Ok(other),
    }
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn get_first_integer_arg(node: &KdlNode) -> Option<i128> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_integer())
}
