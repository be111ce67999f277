//! Test doubles shared by the builder's unit tests.

use async_trait::async_trait;
use lighthouse_core::compose::ComposeTool;
use lighthouse_core::runtime::{ContainerInfo, ContainerRuntime};
use lighthouse_core::secret::{ResolvedEnvironment, SecretStore};
use lighthouse_core::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use zip::write::SimpleFileOptions;

use crate::fetch::ArchiveSource;

/// Answer a single HTTP request with `response` and return the request text.
pub async fn serve_once(response: String) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&chunk[..n]);
            if request.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        String::from_utf8_lossy(&request).to_string()
    });

    (format!("http://{}", addr), handle)
}

pub fn http_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: application/zip\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    )
}

/// An entry for [`zip_bytes`]. Names ending in `/` become directories.
pub enum Entry<'a> {
    File(&'a str, &'a [u8]),
    Dir(&'a str),
    Symlink(&'a str, &'a str),
}

/// Build an in-memory zip archive.
pub fn zip_bytes(entries: &[Entry<'_>]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    for entry in entries {
        match entry {
            Entry::File(name, data) => {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
            Entry::Dir(name) => {
                writer.add_directory(*name, options).unwrap();
            }
            Entry::Symlink(name, target) => {
                writer.add_symlink(*name, *target, options).unwrap();
            }
        }
    }

    writer.finish().unwrap().into_inner()
}

/// A project archive as a branch download would look: `<name>-main/` with a
/// compose file inside.
pub fn project_zip(name: &str, compose: &str) -> Vec<u8> {
    let root = format!("{}-main/", name);
    let compose_path = format!("{}compose.yaml", root);
    zip_bytes(&[
        Entry::Dir(&root),
        Entry::File(&compose_path, compose.as_bytes()),
    ])
}

/// Serves a fixed archive from memory.
pub struct FakeFetcher {
    archive: Option<Vec<u8>>,
    pub urls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn serving(archive: Vec<u8>) -> Self {
        Self {
            archive: Some(archive),
            urls: Mutex::new(Vec::new()),
        }
    }

    /// Every fetch fails as if the host were unreachable.
    pub fn unreachable() -> Self {
        Self {
            archive: None,
            urls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ArchiveSource for FakeFetcher {
    async fn fetch(
        &self,
        url: &str,
        download_dir: &Path,
        target_name: &str,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        self.urls.lock().unwrap().push(url.to_string());
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let archive = self
            .archive
            .as_ref()
            .ok_or_else(|| Error::Transfer(format!("GET {} failed: connection refused", url)))?;

        tokio::fs::create_dir_all(download_dir).await.unwrap();
        let dest = download_dir.join(format!("{}.zip", target_name));
        tokio::fs::write(&dest, archive).await.unwrap();
        Ok(dest)
    }
}

/// How [`FakeRuntime::stop`] answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBehavior {
    Stops,
    NotFound,
    Denied,
}

/// In-memory container runtime recording every call.
pub struct FakeRuntime {
    stop: StopBehavior,
    running: Mutex<HashSet<String>>,
    /// Names whose `start` fails.
    broken: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeRuntime {
    pub fn new(stop: StopBehavior) -> Self {
        Self {
            stop,
            running: Mutex::new(HashSet::new()),
            broken: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_running(self, names: &[&str]) -> Self {
        self.running
            .lock()
            .unwrap()
            .extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn with_broken(mut self, name: &str) -> Self {
        self.broken.insert(name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str, name: &str) {
        self.calls.lock().unwrap().push(format!("{} {}", call, name));
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn start(&self, name: &str) -> Result<()> {
        self.record("start", name);
        if self.broken.contains(name) {
            return Err(Error::Lifecycle {
                name: name.to_string(),
                message: "failed to start: image missing".to_string(),
            });
        }
        self.running.lock().unwrap().insert(name.to_string());
        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<()> {
        self.record("stop", name);
        match self.stop {
            StopBehavior::Stops => {
                self.running.lock().unwrap().remove(name);
                Ok(())
            }
            StopBehavior::NotFound => Err(Error::NotFound(format!("no such container {}", name))),
            StopBehavior::Denied => Err(Error::Lifecycle {
                name: name.to_string(),
                message: "failed to stop: permission denied".to_string(),
            }),
        }
    }

    async fn restart(&self, name: &str) -> Result<()> {
        self.record("restart", name);
        self.running.lock().unwrap().insert(name.to_string());
        Ok(())
    }

    async fn is_running(&self, name: &str) -> Result<bool> {
        self.record("is_running", name);
        Ok(self.running.lock().unwrap().contains(name))
    }

    async fn list(&self, _all: bool) -> Result<Vec<ContainerInfo>> {
        let mut names: Vec<String> = self.running.lock().unwrap().iter().cloned().collect();
        names.sort();
        Ok(names
            .into_iter()
            .map(|name| ContainerInfo {
                id: format!("id-{}", name),
                image: format!("{}:latest", name),
                state: "running".to_string(),
                status: "Up".to_string(),
                name,
            })
            .collect())
    }
}

/// Compose double: echoes the staged compose file as the rendered manifest.
#[derive(Default)]
pub struct FakeCompose {
    pub render_fails: bool,
    pub build_fails: bool,
    /// How long `build_project` takes; it honours cancellation meanwhile.
    pub build_delay: Option<Duration>,
    pub built: Mutex<Option<(PathBuf, Vec<(String, String)>)>>,
}

impl FakeCompose {
    pub fn built(&self) -> Option<(PathBuf, Vec<(String, String)>)> {
        self.built.lock().unwrap().clone()
    }
}

#[async_trait]
impl ComposeTool for FakeCompose {
    async fn render_manifest(
        &self,
        project_dir: &Path,
        _cancel: &CancellationToken,
    ) -> Result<String> {
        if self.render_fails {
            return Err(Error::SecretDiscovery {
                message: "config exited with 14".to_string(),
                output: "no configuration file provided: not found".to_string(),
            });
        }
        tokio::fs::read_to_string(project_dir.join("compose.yaml"))
            .await
            .map_err(|e| Error::SecretDiscovery {
                message: e.to_string(),
                output: String::new(),
            })
    }

    async fn build_project(
        &self,
        project_dir: &Path,
        env: &ResolvedEnvironment,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if let Some(delay) = self.build_delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return Err(Error::Cancelled),
            }
        }
        if self.build_fails {
            return Err(Error::Build("up exited with 1".to_string()));
        }
        let vars = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        *self.built.lock().unwrap() = Some((project_dir.to_path_buf(), vars));
        Ok(())
    }
}

/// Secret store backed by a map, counting lookups.
#[derive(Default)]
pub struct FakeStore {
    values: HashMap<String, String>,
    lookups: AtomicUsize,
}

impl FakeStore {
    pub fn with(pairs: &[(&str, &str)]) -> Self {
        Self {
            values: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretStore for FakeStore {
    async fn get(&self, name: &str) -> Result<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("secret {}", name)))
    }
}
