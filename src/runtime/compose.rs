use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::model::ServiceConfig;
use crate::runtime::{health, ContainerRuntime};

/// `ContainerRuntime` backed by the `docker compose` CLI.
pub struct ComposeCli;

/// One service row from `docker compose ps --format json`.
#[derive(Debug, Deserialize)]
pub struct ComposePsEntry {
    #[serde(rename = "Service")]
    pub service: String,
    #[serde(rename = "State")]
    pub state: String,
}

/// `docker compose ps --format json` emits a JSON array on newer versions
/// and newline-delimited objects on older ones. Accept both.
pub fn parse_compose_ps(stdout: &str) -> Result<Vec<ComposePsEntry>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if let Ok(entries) = serde_json::from_str::<Vec<ComposePsEntry>>(trimmed) {
        return Ok(entries);
    }

    let mut entries = Vec::new();
    for line in trimmed.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let entry: ComposePsEntry =
            serde_json::from_str(line).context("parsing docker compose ps output")?;
        entries.push(entry);
    }
    Ok(entries)
}

#[async_trait]
impl ContainerRuntime for ComposeCli {
    async fn check_engine(&self) -> Result<()> {
        let output = tokio::process::Command::new("docker")
            .arg("info")
            .output()
            .await
            .context("invoking docker")?;
        if !output.status.success() {
            bail!(
                "container engine is not reachable: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    async fn up(
        &self,
        project_name: &str,
        env: &BTreeMap<String, String>,
        compose_file: &Path,
        wait: bool,
    ) -> Result<()> {
        let file = compose_file.to_string_lossy();
        let mut cmd = tokio::process::Command::new("docker");
        cmd.args([
            "compose",
            "-f",
            file.as_ref(),
            "-p",
            project_name,
            "up",
            "-d",
        ]);
        if wait {
            cmd.arg("--wait");
        }
        cmd.envs(env);

        let output = cmd.output().await.context("running docker compose up")?;
        if !output.status.success() {
            bail!(
                "docker compose up failed: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }
        debug!(project = %project_name, "compose up complete");
        Ok(())
    }

    async fn down(
        &self,
        project_name: &str,
        compose_file: &Path,
        remove_volumes: bool,
    ) -> Result<()> {
        let file = compose_file.to_string_lossy();
        let mut cmd = tokio::process::Command::new("docker");
        cmd.args([
            "compose",
            "-f",
            file.as_ref(),
            "-p",
            project_name,
            "down",
            "--remove-orphans",
        ]);
        if remove_volumes {
            cmd.arg("--volumes");
        }

        let output = cmd.output().await.context("running docker compose down")?;
        if !output.status.success() {
            bail!(
                "docker compose down failed: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }
        debug!(project = %project_name, "compose down complete");
        Ok(())
    }

    async fn is_running(&self, project_name: &str, expected_count: usize) -> Result<bool> {
        // is_running is called before the compose file is necessarily
        // known; `docker compose ps -p` works project-wide without -f.
        let output = tokio::process::Command::new("docker")
            .args(["compose", "-p", project_name, "ps", "--format", "json"])
            .output()
            .await
            .context("running docker compose ps")?;
        if !output.status.success() {
            return Ok(false);
        }
        let entries = parse_compose_ps(&String::from_utf8_lossy(&output.stdout))?;
        let running = entries.iter().filter(|e| e.state == "running").count();
        Ok(running >= expected_count)
    }

    async fn is_container_running(&self, project_name: &str, service: &str) -> Result<bool> {
        let output = tokio::process::Command::new("docker")
            .args(["compose", "-p", project_name, "ps", "--format", "json"])
            .output()
            .await
            .context("running docker compose ps")?;
        if !output.status.success() {
            return Ok(false);
        }
        let entries = parse_compose_ps(&String::from_utf8_lossy(&output.stdout))?;
        Ok(entries
            .iter()
            .any(|e| e.service == service && e.state == "running"))
    }

    async fn wait_healthy(
        &self,
        project_name: &str,
        compose_file: &Path,
        service: &str,
        config: &ServiceConfig,
        port: u16,
    ) -> Result<()> {
        health::wait_service_healthy(project_name, compose_file, service, config, port).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ps_array_format() {
        let stdout = r#"[{"Service":"postgres","State":"running"},{"Service":"redis","State":"exited"}]"#;
        let entries = parse_compose_ps(stdout).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].service, "postgres");
        assert_eq!(entries[1].state, "exited");
    }

    #[test]
    fn parse_ps_ndjson_format() {
        let stdout = "{\"Service\":\"postgres\",\"State\":\"running\"}\n{\"Service\":\"redis\",\"State\":\"running\"}\n";
        let entries = parse_compose_ps(stdout).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.state == "running"));
    }

    #[test]
    fn parse_ps_empty_output() {
        assert!(parse_compose_ps("").unwrap().is_empty());
        assert!(parse_compose_ps("  \n").unwrap().is_empty());
    }

    #[test]
    fn parse_ps_garbage_is_an_error() {
        assert!(parse_compose_ps("not json").is_err());
    }
}
