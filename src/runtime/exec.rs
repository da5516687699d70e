use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::platform;
use crate::runtime::{Exec, ExecResult, ProcessSpawner};

/// Runs commands through the user's login shell, mirroring what they would
/// get typing the same line in a terminal.
pub struct ShellExec;

#[async_trait]
impl Exec for ShellExec {
    async fn exec(
        &self,
        command: &str,
        cwd: Option<&Path>,
        env: &BTreeMap<String, String>,
    ) -> Result<ExecResult> {
        let mut cmd = platform::shell_command(command);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd.envs(env);
        cmd.stdin(Stdio::null());

        let output = cmd
            .output()
            .await
            .with_context(|| format!("running command: {}", command))?;

        Ok(ExecResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[async_trait]
impl ProcessSpawner for ShellExec {
    async fn spawn(
        &self,
        command: &str,
        cwd: Option<&Path>,
        env: &BTreeMap<String, String>,
    ) -> Result<u32> {
        let mut cmd = platform::shell_command(command);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd.envs(env);
        platform::configure_process_group(&mut cmd);

        let child = cmd
            .spawn()
            .with_context(|| format!("spawning: {}", command))?;
        let pid = child
            .id()
            .context("spawned process exited before a PID was observed")?;
        // The handle is dropped without awaiting: there is no
        // restart-on-crash policy and teardown signals the process group.
        // kill_on_drop is off, so the process keeps running and the runtime
        // reaps it when it exits.
        drop(child);
        Ok(pid)
    }

    async fn spawn_detached(&self, program: &Path, args: &[String]) -> Result<u32> {
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        platform::configure_process_group(&mut cmd);

        let child = cmd
            .spawn()
            .with_context(|| format!("spawning detached: {}", program.display()))?;
        let pid = child
            .id()
            .context("detached process exited before a PID was observed")?;
        drop(child);
        Ok(pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exec_captures_stdout_and_exit_code() {
        let result = ShellExec
            .exec("echo hello", None, &BTreeMap::new())
            .await
            .unwrap();
        assert!(result.success());
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn exec_nonzero_exit_is_not_an_error() {
        let result = ShellExec
            .exec("exit 3", None, &BTreeMap::new())
            .await
            .unwrap();
        assert!(!result.success());
        assert_eq!(result.exit_code, 3);
    }

    #[tokio::test]
    async fn exec_passes_env_and_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = BTreeMap::new();
        env.insert("DEVDOCK_TEST_VAR".to_string(), "42".to_string());
        let result = ShellExec
            .exec("echo $DEVDOCK_TEST_VAR; pwd", Some(dir.path()), &env)
            .await
            .unwrap();
        assert!(result.stdout.contains("42"));
    }

    #[tokio::test]
    async fn spawn_returns_live_pid() {
        let pid = ShellExec
            .spawn("sleep 5", None, &BTreeMap::new())
            .await
            .unwrap();
        assert!(crate::platform::is_process_alive(pid));
        crate::platform::terminate_group(pid);
    }

    #[tokio::test]
    async fn exited_children_are_reaped() {
        let pid = ShellExec
            .spawn("exit 0", None, &BTreeMap::new())
            .await
            .unwrap();
        // A zombie still answers kill(pid, 0); the pid disappears only
        // once the runtime has reaped the child.
        for _ in 0..100 {
            if !crate::platform::is_process_alive(pid) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("child {} was never reaped", pid);
    }
}
