//! Idle-shutdown protocol: a heartbeat emitter in the foreground process
//! and a detached monitor that tears the stack down once the heartbeat
//! goes stale.
//!
//! The two processes share no memory. Coordination runs entirely through
//! two plain-text files under the project's run directory, so the protocol
//! is best-effort and tolerates concurrent reads and writes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::paths;
use crate::platform;
use crate::runtime::{ComposeFileProvider, ContainerRuntime, ProcessSpawner};

/// Liveness signal between the foreground session and the monitor.
pub trait LivenessChannel: Send + Sync {
    fn emit(&self) -> Result<()>;
    /// `None` for a missing or unparseable signal. The monitor treats that
    /// as "not started yet", never as idle.
    fn read(&self) -> Option<DateTime<Utc>>;
    fn clear(&self);
}

/// Heartbeat file holding unix millis as a bare decimal.
pub struct FileLiveness {
    path: PathBuf,
}

impl FileLiveness {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn for_project(project_name: &str) -> Self {
        Self::new(paths::heartbeat_path(project_name))
    }
}

impl LivenessChannel for FileLiveness {
    fn emit(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        std::fs::write(&self.path, Utc::now().timestamp_millis().to_string())
            .with_context(|| format!("writing heartbeat {}", self.path.display()))
    }

    fn read(&self) -> Option<DateTime<Utc>> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        let millis = content.trim().parse::<i64>().ok()?;
        DateTime::from_timestamp_millis(millis)
    }

    fn clear(&self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Start the periodic heartbeat. Emits immediately, then on every interval
/// tick until the token is cancelled.
pub fn spawn_heartbeat(
    channel: Arc<dyn LivenessChannel>,
    interval: Duration,
    token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("heartbeat stopped");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = channel.emit() {
                        warn!(error = %format!("{:#}", e), "heartbeat write failed");
                    }
                }
            }
        }
    })
}

fn read_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path)
        .ok()?
        .trim()
        .parse::<u32>()
        .ok()
}

/// Try to become the watchdog for this project. Returns `false` when a
/// live instance already holds the PID file; stale files are replaced.
pub fn claim_pid_file(path: &Path) -> Result<bool> {
    if let Some(pid) = read_pid(path) {
        if platform::is_process_alive(pid) {
            return Ok(false);
        }
        debug!(pid, "removing stale watchdog pid file");
        let _ = std::fs::remove_file(path);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, std::process::id().to_string())
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(true)
}

/// Spawn the detached monitor process for this project, unless one is
/// already alive. Returns the monitor PID when a new one was started.
pub async fn spawn_watchdog(
    project_name: &str,
    idle_timeout: &str,
    spawner: &dyn ProcessSpawner,
) -> Result<Option<u32>> {
    let pid_path = paths::watchdog_pid_path(project_name);
    if let Some(pid) = read_pid(&pid_path) {
        if platform::is_process_alive(pid) {
            debug!(pid, "watchdog already running");
            return Ok(None);
        }
    }
    let exe = std::env::current_exe().context("resolving current executable")?;
    let args = vec![
        "watchdog".to_string(),
        "--project".to_string(),
        project_name.to_string(),
        "--idle-timeout".to_string(),
        idle_timeout.to_string(),
    ];
    let pid = spawner.spawn_detached(&exe, &args).await?;
    info!(pid, "watchdog spawned");
    Ok(Some(pid))
}

/// Tear down the idle-shutdown state for a project: signal a live monitor,
/// then remove the PID file and the heartbeat. Called on explicit stop so an
/// orphaned monitor never issues a second teardown for an environment the
/// user already stopped. Best-effort; missing files are fine.
pub fn stop_watchdog(project_name: &str) {
    let channel = FileLiveness::for_project(project_name);
    stop_watchdog_at(&paths::watchdog_pid_path(project_name), &channel);
}

fn stop_watchdog_at(pid_path: &Path, channel: &dyn LivenessChannel) {
    if let Some(pid) = read_pid(pid_path) {
        if platform::is_process_alive(pid) {
            debug!(pid, "terminating watchdog");
            platform::terminate_group(pid);
        }
    }
    let _ = std::fs::remove_file(pid_path);
    channel.clear();
}

pub struct WatchdogParams<'a> {
    pub project_name: &'a str,
    pub idle_timeout: Duration,
    pub check_interval: Duration,
}

/// The monitor loop, run inside the hidden `watchdog` subcommand.
///
/// Exits on one of three paths: another live instance exists (no-op), a
/// termination signal arrives (clean up files, leave containers alone), or
/// the heartbeat goes stale past the idle timeout (tear down, clean up).
pub async fn run_watchdog(
    params: WatchdogParams<'_>,
    channel: &dyn LivenessChannel,
    runtime: &dyn ContainerRuntime,
    compose: &dyn ComposeFileProvider,
) -> Result<()> {
    let pid_path = paths::watchdog_pid_path(params.project_name);
    if !claim_pid_file(&pid_path)? {
        info!(project = %params.project_name, "another watchdog is alive, exiting");
        return Ok(());
    }

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("installing SIGTERM handler")?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
        .context("installing SIGINT handler")?;

    info!(
        project = %params.project_name,
        idle_timeout = ?params.idle_timeout,
        "watchdog running"
    );

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("watchdog terminated, leaving containers running");
                channel.clear();
                let _ = std::fs::remove_file(&pid_path);
                return Ok(());
            }
            _ = sigint.recv() => {
                info!("watchdog interrupted, leaving containers running");
                channel.clear();
                let _ = std::fs::remove_file(&pid_path);
                return Ok(());
            }
            _ = tokio::time::sleep(params.check_interval) => {
                let Some(beat) = channel.read() else {
                    debug!("no heartbeat yet, waiting");
                    continue;
                };
                let age = Utc::now()
                    .signed_duration_since(beat)
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                if age <= params.idle_timeout {
                    debug!(age = ?age, "heartbeat fresh");
                    continue;
                }

                // Not an error path. The environment was simply abandoned.
                info!(
                    project = %params.project_name,
                    idle_for = ?age,
                    "idle shutdown: tearing down containers"
                );
                let result = async {
                    let compose_file = compose.ensure_compose_file().await?;
                    runtime.down(params.project_name, &compose_file, false).await
                }
                .await;
                channel.clear();
                let _ = std::fs::remove_file(&pid_path);
                return result;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let channel = FileLiveness::new(dir.path().join("heartbeat"));

        assert!(channel.read().is_none());
        channel.emit().unwrap();
        let beat = channel.read().unwrap();
        assert!(Utc::now().signed_duration_since(beat).num_seconds() < 5);

        channel.clear();
        assert!(channel.read().is_none());
    }

    #[test]
    fn heartbeat_read_is_trim_tolerant() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heartbeat");
        std::fs::write(&path, "  1700000000000\n").unwrap();
        assert!(FileLiveness::new(path).read().is_some());
    }

    #[test]
    fn unparseable_heartbeat_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heartbeat");
        std::fs::write(&path, "not-a-timestamp").unwrap();
        assert!(FileLiveness::new(path).read().is_none());
    }

    #[test]
    fn claim_respects_live_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watchdog.pid");

        // Our own PID is definitely alive.
        std::fs::write(&path, std::process::id().to_string()).unwrap();
        assert!(!claim_pid_file(&path).unwrap());
    }

    #[test]
    fn claim_replaces_stale_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watchdog.pid");

        std::fs::write(&path, "4000000").unwrap();
        assert!(claim_pid_file(&path).unwrap());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            std::process::id().to_string()
        );
    }

    #[test]
    fn explicit_stop_removes_both_state_files() {
        let dir = tempfile::tempdir().unwrap();
        let pid_path = dir.path().join("watchdog.pid");
        let channel = FileLiveness::new(dir.path().join("heartbeat"));

        std::fs::write(&pid_path, "4000000").unwrap();
        channel.emit().unwrap();

        stop_watchdog_at(&pid_path, &channel);
        assert!(!pid_path.exists());
        assert!(channel.read().is_none());
    }

    #[test]
    fn explicit_stop_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let channel = FileLiveness::new(dir.path().join("heartbeat"));
        stop_watchdog_at(&dir.path().join("watchdog.pid"), &channel);
    }

    #[test]
    fn claim_creates_missing_run_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run").join("proj").join("watchdog.pid");
        assert!(claim_pid_file(&path).unwrap());
        assert!(path.is_file());
    }

    #[tokio::test]
    async fn heartbeat_task_emits_until_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let channel = Arc::new(FileLiveness::new(dir.path().join("heartbeat")));
        let token = CancellationToken::new();

        let handle = spawn_heartbeat(channel.clone(), Duration::from_millis(10), token.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(channel.read().is_some());

        token.cancel();
        handle.await.unwrap();
    }
}
