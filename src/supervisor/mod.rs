//! Dependency Supervisor (§4.Q): brings up the optional remote vector DB
//! container the same way `embeddings/download.rs` brings up a model —
//! probe, fetch/start if missing, poll until ready, and recover a collection
//! that has gone bad rather than silently serving degraded search.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use sysinfo::{ProcessExt, System, SystemExt};

use crate::config::VectorStoreConfig;
use crate::error::{ConduitError, Result};
use crate::storage::qdrant_store::QdrantStore;

const CONTAINER_NAME: &str = "conduit-qdrant";
const IMAGE: &str = "qdrant/qdrant:latest";
const READY_POLL_INTERVAL: Duration = Duration::from_millis(500);
const READY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerRuntime {
    Podman,
    Docker,
}

impl ContainerRuntime {
    fn binary(&self) -> &'static str {
        match self {
            ContainerRuntime::Podman => "podman",
            ContainerRuntime::Docker => "docker",
        }
    }
}

/// Brings a remote vector store container up to a ready, healthy state.
///
/// Mirrors the `download_with_retry`/`download_streaming` shell-out-then-poll
/// shape, substituting container lifecycle calls for HTTP downloads.
pub struct DependencySupervisor {
    data_dir: PathBuf,
    config: VectorStoreConfig,
}

impl DependencySupervisor {
    pub fn new(data_dir: PathBuf, config: VectorStoreConfig) -> Self {
        Self { data_dir, config }
    }

    fn qdrant_dir(&self) -> PathBuf {
        self.data_dir.join("qdrant")
    }

    fn base_url(&self) -> String {
        format!("{}:{}", self.config.host.trim_end_matches('/'), self.config.port)
    }

    /// Runs the full sequence: directories, runtime detection, reachability,
    /// find-or-create, readiness poll, health recovery. Idempotent — calling
    /// this on an already-healthy instance is a cheap no-op past step (c).
    pub async fn ensure_ready(&self) -> Result<QdrantStore> {
        self.ensure_directories()?;

        if !self.is_reachable().await {
            let runtime = self.detect_runtime()?;
            self.find_or_create_container(runtime)?;
            self.wait_until_ready().await?;
        }

        let store = QdrantStore::new(
            &self.config.host,
            self.config.port,
            &self.config.collection,
            self.config.dimension,
        );
        store.ensure_collection().await?;

        if let Ok(health) = store.check_health().await {
            if health.needs_recovery() {
                tracing::warn!(
                    status = %health.status,
                    points = health.points_count,
                    indexed = health.indexed_vectors_count,
                    "qdrant collection unhealthy, recovering"
                );
                self.recover(&store).await?;
            }
        }

        Ok(store)
    }

    /// (a) Storage directory tree: `./qdrant`, `./qdrant/collections`,
    /// `./qdrant/snapshots`.
    fn ensure_directories(&self) -> Result<()> {
        let root = self.qdrant_dir();
        for sub in ["", "collections", "snapshots"] {
            let dir = if sub.is_empty() { root.clone() } else { root.join(sub) };
            std::fs::create_dir_all(&dir).map_err(ConduitError::Io)?;
        }
        Ok(())
    }

    /// (c, first half) Is the API already reachable, whoever started it?
    async fn is_reachable(&self) -> bool {
        reqwest::Client::new()
            .get(format!("{}/collections", self.base_url()))
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// (b) Detect podman, falling back to docker, by checking PATH and a few
    /// known install locations; on macOS also requires the podman VM to be
    /// running before trusting the CLI is usable headlessly.
    fn detect_runtime(&self) -> Result<ContainerRuntime> {
        if self.binary_available("podman") && self.podman_usable() {
            return Ok(ContainerRuntime::Podman);
        }
        if self.binary_available("docker") {
            return Ok(ContainerRuntime::Docker);
        }
        Err(ConduitError::UnavailableDependency {
            dependency: "vector_store".to_string(),
            reason: "neither podman nor docker is available on PATH".to_string(),
        })
    }

    fn binary_available(&self, name: &str) -> bool {
        let known_dirs = ["/usr/local/bin", "/usr/bin", "/opt/homebrew/bin", "/opt/podman/bin"];
        if which_in_path(name) {
            return true;
        }
        known_dirs.iter().any(|dir| Path::new(dir).join(name).exists())
    }

    /// On macOS, podman runs containers inside a managed VM; a present CLI
    /// with a stopped VM cannot actually run anything.
    #[cfg(target_os = "macos")]
    fn podman_usable(&self) -> bool {
        Command::new("podman")
            .args(["machine", "list", "--format", "{{.Running}}"])
            .output()
            .map(|out| {
                String::from_utf8_lossy(&out.stdout)
                    .lines()
                    .any(|line| line.trim().eq_ignore_ascii_case("true"))
            })
            .unwrap_or(false)
    }

    #[cfg(not(target_os = "macos"))]
    fn podman_usable(&self) -> bool {
        let mut system = System::new();
        system.refresh_processes();
        // A daemonless podman has no long-running process to find; PATH
        // presence is sufficient outside macOS. The process scan still lets
        // us prefer an already-running rootful daemon if one exists.
        self.binary_available("podman") || system.processes_by_name("podman").next().is_some()
    }

    /// (c, second half) `start` the named container if it exists but is
    /// stopped; otherwise pull the image and `run` it fresh.
    fn find_or_create_container(&self, runtime: ContainerRuntime) -> Result<()> {
        let bin = runtime.binary();

        let exists = Command::new(bin)
            .args(["inspect", CONTAINER_NAME])
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false);

        if exists {
            run_cli(bin, &["start", CONTAINER_NAME])?;
            return Ok(());
        }

        run_cli(bin, &["pull", IMAGE])?;

        let volume_mount = format!("{}:/qdrant/storage{}", self.qdrant_dir().display(), selinux_suffix());
        let port_mapping = format!("{}:6333", self.config.port);
        run_cli(
            bin,
            &[
                "run",
                "-d",
                "--name",
                CONTAINER_NAME,
                "-p",
                &port_mapping,
                "-v",
                &volume_mount,
                IMAGE,
            ],
        )?;
        Ok(())
    }

    /// (d) Poll readiness every 500 ms, up to 30 s total.
    async fn wait_until_ready(&self) -> Result<()> {
        let deadline = tokio::time::Instant::now() + READY_TIMEOUT;
        loop {
            if self.is_reachable().await {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ConduitError::UnavailableDependency {
                    dependency: "vector_store".to_string(),
                    reason: format!("container did not become ready within {:?}", READY_TIMEOUT),
                });
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    /// (e) Recovery: drop the bad collection and its on-disk storage,
    /// leaving re-indexing to the next sync.
    async fn recover(&self, store: &QdrantStore) -> Result<()> {
        let client = reqwest::Client::new();
        let _ = client
            .delete(format!(
                "{}/collections/{}",
                self.base_url(),
                self.config.collection
            ))
            .send()
            .await;
        let collection_dir = self.qdrant_dir().join("collections").join(&self.config.collection);
        if collection_dir.exists() {
            std::fs::remove_dir_all(&collection_dir).map_err(ConduitError::Io)?;
        }
        store.ensure_collection().await?;
        Ok(())
    }
}

fn which_in_path(name: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(name).exists()))
        .unwrap_or(false)
}

#[cfg(target_os = "linux")]
fn selinux_suffix() -> &'static str {
    ":Z"
}

#[cfg(not(target_os = "linux"))]
fn selinux_suffix() -> &'static str {
    ""
}

fn run_cli(bin: &str, args: &[&str]) -> Result<()> {
    let output = Command::new(bin).args(args).output().map_err(ConduitError::Io)?;
    if !output.status.success() {
        return Err(ConduitError::UnavailableDependency {
            dependency: "vector_store".to_string(),
            reason: format!(
                "`{} {}` failed: {}",
                bin,
                args.join(" "),
                String::from_utf8_lossy(&output.stderr)
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> VectorStoreConfig {
        VectorStoreConfig {
            backend: crate::config::VectorStoreBackend::Remote,
            host: "http://127.0.0.1".to_string(),
            port: 6333,
            collection: "conduit".to_string(),
            dimension: 384,
            batch_size: 32,
        }
    }

    #[test]
    fn base_url_combines_host_and_port() {
        let sup = DependencySupervisor::new(PathBuf::from("/tmp/conduit-test"), config());
        assert_eq!(sup.base_url(), "http://127.0.0.1:6333");
    }

    #[test]
    fn qdrant_dir_is_nested_under_data_dir() {
        let sup = DependencySupervisor::new(PathBuf::from("/tmp/conduit-test"), config());
        assert_eq!(sup.qdrant_dir(), PathBuf::from("/tmp/conduit-test/qdrant"));
    }

    #[test]
    fn selinux_suffix_is_platform_gated() {
        let suffix = selinux_suffix();
        if cfg!(target_os = "linux") {
            assert_eq!(suffix, ":Z");
        } else {
            assert_eq!(suffix, "");
        }
    }

    #[test]
    fn ensure_directories_creates_full_tree() {
        let dir = std::env::temp_dir().join(format!("conduit-supervisor-test-{}", std::process::id()));
        let sup = DependencySupervisor::new(dir.clone(), config());
        sup.ensure_directories().unwrap();
        assert!(dir.join("qdrant").is_dir());
        assert!(dir.join("qdrant/collections").is_dir());
        assert!(dir.join("qdrant/snapshots").is_dir());
        std::fs::remove_dir_all(&dir).ok();
    }
}
