use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use backon::{ExponentialBuilder, Retryable};
use tracing::{debug, trace};

use crate::config::model::{HealthCheck, ServiceConfig};

/// Overall budget for a single service to come up before we give up.
const SERVICE_TIMEOUT: Duration = Duration::from_secs(60);

fn retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(250))
        .with_max_delay(Duration::from_secs(3))
        .with_max_times(200)
}

/// Block until `service` reports healthy according to its configured check.
pub async fn wait_service_healthy(
    project_name: &str,
    compose_file: &Path,
    service: &str,
    config: &ServiceConfig,
    port: u16,
) -> Result<()> {
    let container = config.container_service_name(service);

    match &config.health {
        HealthCheck::Disabled => {
            debug!(service, "health check disabled, skipping wait");
            return Ok(());
        }
        HealthCheck::Named(tag)
            if !matches!(
                tag.as_str(),
                "postgres" | "redis" | "tcp" | "http" | "mysql" | "clickhouse" | "mongodb"
            ) =>
        {
            bail!("unknown health check '{}' for service '{}'", tag, service);
        }
        _ => {}
    }

    let attempt = || async {
        probe_once(project_name, compose_file, &container, &config.health, port).await
    };

    tokio::time::timeout(
        SERVICE_TIMEOUT,
        attempt.retry(retry_policy()).notify(|err, dur| {
            trace!(service, error = %err, retry_in = ?dur, "health probe failed");
        }),
    )
    .await
    .map_err(|_| anyhow!("service '{}' did not become healthy within {:?}", service, SERVICE_TIMEOUT))?
    .with_context(|| format!("service '{}' failed its health check", service))?;

    debug!(service, "healthy");
    Ok(())
}

/// Poll an HTTP endpoint until it answers with a success status, within
/// `timeout`. Used for app dev-server readiness.
pub async fn wait_http_ready(url: &str, timeout: Duration) -> Result<()> {
    let url = url.to_string();
    let attempt = || {
        let url = url.clone();
        async move { probe_http(url).await }
    };

    tokio::time::timeout(timeout, attempt.retry(retry_policy()))
        .await
        .map_err(|_| anyhow!("no response from {} within {:?}", url, timeout))?
        .with_context(|| format!("readiness probe for {} failed", url))
}

async fn probe_once(
    project_name: &str,
    compose_file: &Path,
    container: &str,
    health: &HealthCheck,
    port: u16,
) -> Result<()> {
    match health {
        HealthCheck::Disabled => Ok(()),
        HealthCheck::Named(tag) => match tag.as_str() {
            "postgres" => {
                probe_compose_exec(
                    project_name,
                    compose_file,
                    container,
                    "pg_isready -h localhost -q",
                    None,
                )
                .await
            }
            "redis" => {
                probe_compose_exec(
                    project_name,
                    compose_file,
                    container,
                    "redis-cli ping",
                    Some("PONG"),
                )
                .await
            }
            "http" => probe_http(format!("http://localhost:{port}/")).await,
            // clickhouse, mysql and mongodb accept connections as soon as
            // they are serving, so a socket probe is sufficient.
            _ => probe_tcp(port).await,
        },
        HealthCheck::Custom { command, expect } => {
            probe_compose_exec(project_name, compose_file, container, command, expect.as_deref())
                .await
        }
    }
}

async fn probe_tcp(port: u16) -> Result<()> {
    tokio::net::TcpStream::connect(("127.0.0.1", port))
        .await
        .map(|_| ())
        .with_context(|| format!("tcp connect to port {} refused", port))
}

async fn probe_http(url: String) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;
    let response = client.get(&url).send().await?;
    if response.status().is_success() {
        Ok(())
    } else {
        bail!("{} answered {}", url, response.status())
    }
}

async fn probe_compose_exec(
    project_name: &str,
    compose_file: &Path,
    container: &str,
    command: &str,
    expect: Option<&str>,
) -> Result<()> {
    let file = compose_file.to_string_lossy();
    let output = tokio::process::Command::new("docker")
        .args([
            "compose",
            "-f",
            file.as_ref(),
            "-p",
            project_name,
            "exec",
            "-T",
            container,
            "sh",
            "-c",
            command,
        ])
        .output()
        .await
        .context("running docker compose exec")?;

    if !output.status.success() {
        bail!(
            "probe in '{}' exited {}: {}",
            container,
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    if let Some(expected) = expect {
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.contains(expected) {
            bail!("probe in '{}' did not report '{}'", container, expected);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_with(health: HealthCheck) -> ServiceConfig {
        ServiceConfig {
            port: 5432,
            secondary_port: None,
            health,
            url_template: None,
            database: None,
            user: None,
            password: None,
            expose: false,
            container_service: None,
        }
    }

    #[tokio::test]
    async fn disabled_check_returns_immediately() {
        let config = service_with(HealthCheck::Disabled);
        wait_service_healthy("proj", Path::new("compose.yml"), "db", &config, 5432)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_named_check_is_rejected() {
        let config = service_with(HealthCheck::Named("cassandra".to_string()));
        let err = wait_service_healthy("proj", Path::new("compose.yml"), "db", &config, 9042)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown health check"));
    }

    #[tokio::test]
    async fn tcp_probe_succeeds_against_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });
        probe_tcp(port).await.unwrap();
    }

    #[tokio::test]
    async fn tcp_probe_fails_with_nothing_listening() {
        // Bind then drop to get a port that is very likely free.
        let port = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        assert!(probe_tcp(port).await.is_err());
    }
}
