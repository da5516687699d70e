//! Start/stop/restart sequencing for one environment.
//!
//! The controller drives containers, migrations, hooks, seeding and dev
//! servers through the collaborator traits in [`crate::runtime`], so the
//! whole flow is testable against in-memory fakes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::future::{join_all, try_join_all};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::model::{DevConfig, SeedCheck};
use crate::discovery::ports::ComputedPorts;
use crate::runtime::{health, ComposeFileProvider, ContainerRuntime, Exec, ProcessSpawner};

/// Flags for one `start()` call. The checkpoint flags (`down`, `reset`,
/// `up_only`, `migrate_only`, `seed_only`) are early exits within the same
/// sequence, not separate code paths.
#[derive(Debug, Clone)]
pub struct StartOptions {
    pub down: bool,
    /// Tear down and remove volumes, then exit.
    pub reset: bool,
    pub up_only: bool,
    pub migrate_only: bool,
    pub seed_only: bool,
    pub start_servers: bool,
    pub production: bool,
    /// Wait for service health after bring-up.
    pub wait: bool,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            down: false,
            reset: false,
            up_only: false,
            migrate_only: false,
            seed_only: false,
            start_servers: true,
            production: false,
            wait: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StopOptions {
    pub remove_volumes: bool,
}

/// All migrations run to completion before failures are evaluated, so one
/// error can name every migration that failed.
#[derive(Debug, Error)]
#[error("{failed} of {total} migrations failed:\n{details}")]
pub struct MigrationFailure {
    pub failed: usize,
    pub total: usize,
    details: String,
}

#[derive(Debug, Error)]
#[error("hook '{hook}' exited {code}:\n{output}")]
pub struct HookFailure {
    pub hook: String,
    pub code: i32,
    output: String,
}

pub struct LifecycleController<'a> {
    pub config: &'a DevConfig,
    pub project_name: &'a str,
    pub root: &'a Path,
    pub ports: &'a ComputedPorts,
    pub runtime: &'a dyn ContainerRuntime,
    pub compose: &'a dyn ComposeFileProvider,
    pub exec: &'a dyn Exec,
    pub spawner: &'a dyn ProcessSpawner,
}

impl<'a> LifecycleController<'a> {
    /// Run the full start sequence. Returns the spawned app PID map when
    /// servers were started, `None` for every other exit point.
    pub async fn start(
        &self,
        opts: &StartOptions,
        env: &BTreeMap<String, String>,
    ) -> Result<Option<BTreeMap<String, u32>>> {
        if opts.down || opts.reset {
            self.stop(
                &StopOptions {
                    remove_volumes: opts.reset,
                },
                env,
            )
            .await?;
            return Ok(None);
        }

        let compose_file = self.compose.ensure_compose_file().await?;
        self.runtime.check_engine().await?;

        let expected = self.config.services.len();
        if expected > 0
            && self
                .runtime
                .is_running(self.project_name, expected)
                .await
                .unwrap_or(false)
        {
            info!(project = %self.project_name, "containers already running, skipping bring-up");
        } else {
            info!(project = %self.project_name, "starting containers");
            self.runtime
                .up(self.project_name, env, &compose_file, opts.wait)
                .await?;
        }

        if opts.wait {
            self.wait_all_healthy(&compose_file).await?;
        }

        if opts.up_only {
            return Ok(None);
        }

        self.run_migrations(env).await?;
        if opts.migrate_only {
            return Ok(None);
        }

        if let Some(hook) = &self.config.hooks.after_containers_ready {
            self.run_hook("after_containers_ready", hook, env).await?;
        }

        self.run_seed(env).await;
        if opts.seed_only {
            return Ok(None);
        }

        if opts.start_servers && !self.config.apps.is_empty() {
            let pids = self.start_servers(opts, env).await?;
            return Ok(Some(pids));
        }

        Ok(None)
    }

    pub async fn stop(&self, opts: &StopOptions, env: &BTreeMap<String, String>) -> Result<()> {
        if let Some(hook) = &self.config.hooks.before_stop {
            self.run_hook("before_stop", hook, env).await?;
        }
        let compose_file = self.compose.ensure_compose_file().await?;
        info!(project = %self.project_name, volumes = opts.remove_volumes, "stopping containers");
        self.runtime
            .down(self.project_name, &compose_file, opts.remove_volumes)
            .await
    }

    /// Stop, then bring containers back without respawning servers.
    pub async fn restart(&self, env: &BTreeMap<String, String>) -> Result<()> {
        self.stop(&StopOptions::default(), env).await?;
        self.start(
            &StartOptions {
                start_servers: false,
                ..StartOptions::default()
            },
            env,
        )
        .await?;
        Ok(())
    }

    pub async fn is_running(&self) -> Result<bool> {
        self.runtime
            .is_running(self.project_name, self.config.services.len())
            .await
    }

    async fn wait_all_healthy(&self, compose_file: &Path) -> Result<()> {
        let waits = self.config.services.iter().map(|(name, service)| {
            let port = self
                .ports
                .get(name.as_str())
                .copied()
                .unwrap_or(service.port);
            self.runtime
                .wait_healthy(self.project_name, compose_file, name, service, port)
        });
        // AND semantics: every service has to come up.
        try_join_all(waits).await?;
        info!("all services healthy");
        Ok(())
    }

    async fn run_migrations(&self, env: &BTreeMap<String, String>) -> Result<()> {
        let mut entries: Vec<(String, String, Option<PathBuf>)> = Vec::new();
        if let Some(database) = &self.config.database {
            entries.push(("database".to_string(), database.migrate.clone(), None));
        }
        for migration in &self.config.migrations {
            entries.push((
                migration.name.clone(),
                migration.command.clone(),
                migration.dir.as_ref().map(|d| self.root.join(d)),
            ));
        }
        if entries.is_empty() {
            return Ok(());
        }

        info!(count = entries.len(), "running migrations");
        let runs = entries.iter().map(|(name, command, dir)| async move {
            let result = self
                .exec
                .exec(command, dir.as_deref().or(Some(self.root)), env)
                .await;
            (name.as_str(), result)
        });
        let results = join_all(runs).await;

        let total = results.len();
        let mut details = String::new();
        let mut failed = 0;
        for (name, result) in results {
            match result {
                Ok(result) if result.success() => {
                    info!(migration = name, "migration complete");
                }
                Ok(result) => {
                    failed += 1;
                    details.push_str(&format!(
                        "  {}: exit {}\n{}\n",
                        name,
                        result.exit_code,
                        indent(result.stderr.trim())
                    ));
                }
                Err(e) => {
                    failed += 1;
                    details.push_str(&format!("  {}: {:#}\n", name, e));
                }
            }
        }

        if failed > 0 {
            return Err(MigrationFailure {
                failed,
                total,
                details,
            }
            .into());
        }
        Ok(())
    }

    /// Seed failures never abort a start. Everything here logs and returns.
    async fn run_seed(&self, env: &BTreeMap<String, String>) {
        let Some(seed) = &self.config.seed else {
            return;
        };

        if let Some(check) = &seed.check {
            match self.count_rows(check, env).await {
                Ok(count) if count > 0 => {
                    info!(table = %check.table, rows = count, "seed data present, skipping seed");
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %format!("{:#}", e), "seed check failed, seeding anyway");
                }
            }
        }

        info!("seeding");
        let dir = seed.dir.as_ref().map(|d| self.root.join(d));
        match self
            .exec
            .exec(&seed.command, dir.as_deref().or(Some(self.root)), env)
            .await
        {
            Ok(result) if result.success() => info!("seed complete"),
            Ok(result) => warn!(
                exit = result.exit_code,
                stderr = %result.stderr.trim(),
                "seed command failed, continuing"
            ),
            Err(e) => warn!(error = %format!("{:#}", e), "seed command failed, continuing"),
        }
    }

    /// Count rows in the check table by exec'ing psql inside the service's
    /// container.
    async fn count_rows(&self, check: &SeedCheck, env: &BTreeMap<String, String>) -> Result<i64> {
        let service = self
            .config
            .services
            .get(&check.service)
            .with_context(|| format!("seed check references unknown service '{}'", check.service))?;
        let container = service.container_service_name(&check.service);
        let user = service.user.as_deref().unwrap_or("postgres");
        let database = service.database.as_deref().unwrap_or("postgres");
        let command = format!(
            "docker compose -p {} exec -T {} psql -U {} -d {} -tAc 'SELECT COUNT(*) FROM \"{}\"'",
            self.project_name, container, user, database, check.table
        );
        let result = self.exec.exec(&command, None, env).await?;
        if !result.success() {
            anyhow::bail!("row count query exited {}: {}", result.exit_code, result.stderr.trim());
        }
        result
            .stdout
            .trim()
            .parse::<i64>()
            .with_context(|| format!("unexpected row count output: {:?}", result.stdout.trim()))
    }

    async fn start_servers(
        &self,
        opts: &StartOptions,
        env: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, u32>> {
        if let Some(hook) = &self.config.hooks.before_servers {
            self.run_hook("before_servers", hook, env).await?;
        }

        if opts.production {
            for (name, app) in &self.config.apps {
                if let Some(build) = &app.build {
                    info!(app = %name, "building");
                    let dir = app.dir.as_ref().map(|d| self.root.join(d));
                    let result = self
                        .exec
                        .exec(build, dir.as_deref().or(Some(self.root)), env)
                        .await?;
                    if !result.success() {
                        anyhow::bail!(
                            "build for app '{}' exited {}:\n{}",
                            name,
                            result.exit_code,
                            result.stderr.trim()
                        );
                    }
                }
            }
        }

        // Sequential spawn so ports are claimed in declaration order.
        let mut pids = BTreeMap::new();
        for (name, app) in &self.config.apps {
            let command = if opts.production {
                app.prod.as_deref().unwrap_or(&app.dev)
            } else {
                &app.dev
            };
            let dir = app.dir.as_ref().map(|d| self.root.join(d));
            let pid = self
                .spawner
                .spawn(command, dir.as_deref().or(Some(self.root)), env)
                .await?;
            info!(app = %name, pid, "spawned");
            pids.insert(name.clone(), pid);
        }

        let budget = readiness_budget();
        let waits: Vec<_> = self
            .config
            .apps
            .iter()
            .filter_map(|(name, app)| {
                let path = app.health_path.as_deref()?;
                let port = self.ports.get(name.as_str()).copied().unwrap_or(app.port);
                let timeout = app
                    .health_timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(budget);
                let url = format!("http://localhost:{}{}", port, path);
                Some(async move {
                    health::wait_http_ready(&url, timeout)
                        .await
                        .with_context(|| format!("app '{}' never became ready", name))
                })
            })
            .collect();
        try_join_all(waits).await?;

        if let Some(hook) = &self.config.hooks.after_servers {
            self.run_hook("after_servers", hook, env).await?;
        }

        Ok(pids)
    }

    async fn run_hook(
        &self,
        name: &str,
        command: &str,
        env: &BTreeMap<String, String>,
    ) -> Result<()> {
        info!(hook = name, "running hook");
        let result = self.exec.exec(command, Some(self.root), env).await?;
        if !result.success() {
            return Err(HookFailure {
                hook: name.to_string(),
                code: result.exit_code,
                output: result.stderr.trim().to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// App readiness budget: CI runners are slower, give them more headroom.
fn readiness_budget() -> Duration {
    if std::env::var_os("CI").is_some() {
        Duration::from_secs(120)
    } else {
        Duration::from_secs(60)
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|l| format!("    {}", l))
        .collect::<Vec<_>>()
        .join("\n")
}
