pub mod compose;
pub mod exec;
pub mod health;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;

use crate::config::model::ServiceConfig;

/// Outcome of a shelled-out command. Non-zero exit codes are data, not
/// errors; callers join several results and evaluate failures together.
#[derive(Debug, Clone)]
pub struct ExecResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Abstract container stack operations. The production implementation
/// shells out to `docker compose`; tests substitute an in-memory fake.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Verify the engine is reachable at all. Called before any bring-up.
    async fn check_engine(&self) -> Result<()>;

    async fn up(
        &self,
        project_name: &str,
        env: &BTreeMap<String, String>,
        compose_file: &Path,
        wait: bool,
    ) -> Result<()>;

    async fn down(&self, project_name: &str, compose_file: &Path, remove_volumes: bool)
        -> Result<()>;

    /// Whether at least `expected_count` managed containers are running.
    async fn is_running(&self, project_name: &str, expected_count: usize) -> Result<bool>;

    async fn is_container_running(&self, project_name: &str, service: &str) -> Result<bool>;

    /// Block until the service's health check passes, or fail once the
    /// retry budget is exhausted.
    async fn wait_healthy(
        &self,
        project_name: &str,
        compose_file: &Path,
        service: &str,
        config: &ServiceConfig,
        port: u16,
    ) -> Result<()>;
}

/// Supplies the compose artifact handed to the runtime. Idempotent.
#[async_trait]
pub trait ComposeFileProvider: Send + Sync {
    async fn ensure_compose_file(&self) -> Result<PathBuf>;
}

/// Shelled command execution for migrations, hooks and seeds.
#[async_trait]
pub trait Exec: Send + Sync {
    async fn exec(
        &self,
        command: &str,
        cwd: Option<&Path>,
        env: &BTreeMap<String, String>,
    ) -> Result<ExecResult>;
}

/// Long-running process spawning: dev servers (foreground session) and the
/// detached watchdog monitor.
#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    /// Spawn a shell command in its own process group, stdio inherited.
    /// Returns the child PID; the caller owns signal forwarding.
    async fn spawn(
        &self,
        command: &str,
        cwd: Option<&Path>,
        env: &BTreeMap<String, String>,
    ) -> Result<u32>;

    /// Spawn a fully detached process (own group, stdio nulled) that
    /// outlives the caller. Returns its PID.
    async fn spawn_detached(&self, program: &Path, args: &[String]) -> Result<u32>;
}

/// Compose provider for a user-maintained compose file: verifies the path
/// exists and hands it through unchanged.
pub struct StaticComposeFile {
    path: PathBuf,
}

impl StaticComposeFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl ComposeFileProvider for StaticComposeFile {
    async fn ensure_compose_file(&self) -> Result<PathBuf> {
        if !self.path.is_file() {
            anyhow::bail!("compose file not found: {}", self.path.display());
        }
        Ok(self.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_compose_file_requires_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docker-compose.yml");

        let provider = StaticComposeFile::new(path.clone());
        assert!(provider.ensure_compose_file().await.is_err());

        std::fs::write(&path, "services: {}\n").unwrap();
        assert_eq!(provider.ensure_compose_file().await.unwrap(), path);
    }
}
