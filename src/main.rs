use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use devdock::cli::{Cli, Commands};
use devdock::commands;
use devdock::config;
use devdock::environment::{EnvOptions, Environment};
use devdock::lifecycle::{StartOptions, StopOptions};
use devdock::platform;
use devdock::runtime::compose::ComposeCli;
use devdock::runtime::exec::ShellExec;
use devdock::runtime::StaticComposeFile;
use devdock::ui::summary::print_startup_summary;
use devdock::watchdog::{self, FileLiveness, LivenessChannel, WatchdogParams};

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber with env-filter support.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config_file = cli.global.config_file;
    let suffix = cli.global.suffix;

    let result = match cli.command {
        Commands::Start {
            up_only,
            migrate,
            seed,
            down,
            reset,
            no_servers,
            prod,
            no_wait,
            no_watchdog,
        } => {
            let opts = StartOptions {
                down,
                reset,
                up_only,
                migrate_only: migrate,
                seed_only: seed,
                start_servers: !no_servers,
                production: prod,
                wait: !no_wait,
            };
            run_start(config_file.as_deref(), suffix.as_deref(), opts, no_watchdog).await
        }
        Commands::Stop { volumes } => run_stop(config_file.as_deref(), suffix.as_deref(), volumes).await,
        Commands::Restart => run_restart(config_file.as_deref(), suffix.as_deref()).await,
        Commands::Env { mode } => commands::env::run(config_file.as_deref(), suffix.as_deref(), &mode),
        Commands::Validate => commands::validate::run(config_file.as_deref()),
        Commands::Init => commands::init::run(),
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "devdock", &mut std::io::stdout());
            Ok(())
        }
        Commands::Watchdog {
            project,
            idle_timeout,
        } => run_watchdog(config_file.as_deref(), &project, &idle_timeout).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn build_environment(config_file: Option<&Path>, suffix: Option<&str>) -> anyhow::Result<Environment> {
    let config_path = config::resolve_config(config_file)?;
    let (config, source) = config::load_config(&config_path)?;
    Environment::new(
        config,
        source,
        EnvOptions {
            suffix: suffix.map(|s| s.to_string()),
            root: config_path.parent().map(|p| p.to_path_buf()),
        },
    )
}

async fn run_start(
    config_file: Option<&Path>,
    suffix: Option<&str>,
    opts: StartOptions,
    no_watchdog: bool,
) -> anyhow::Result<()> {
    let mut env = build_environment(config_file, suffix)?;
    let pids = env.start(&opts).await?;

    if opts.down || opts.reset {
        watchdog::stop_watchdog(env.project_name());
        return Ok(());
    }

    let Some(pids) = pids else {
        print_startup_summary(&env, None);
        return Ok(());
    };
    print_startup_summary(&env, Some(&pids));

    // Liveness signalling for the idle-shutdown protocol.
    let wd = env.config().watchdog.clone();
    let channel: Arc<dyn LivenessChannel> = Arc::new(FileLiveness::for_project(env.project_name()));
    let token = CancellationToken::new();
    let heartbeat = watchdog::spawn_heartbeat(
        channel,
        Duration::from_secs(wd.heartbeat_interval_secs),
        token.clone(),
    );
    if !no_watchdog {
        if let Err(e) = watchdog::spawn_watchdog(env.project_name(), &wd.idle_timeout, &ShellExec).await
        {
            warn!(error = %format!("{:#}", e), "could not spawn watchdog");
        }
    }

    wait_for_shutdown().await?;

    // Stop the heartbeat so the watchdog eventually reclaims the containers,
    // drop any public URLs, then signal the app process groups. Containers
    // stay up for a fast next start.
    token.cancel();
    let _ = heartbeat.await;
    env.clear_public_urls();
    for (name, pid) in &pids {
        tracing::info!(app = %name, pid, "stopping");
        platform::terminate_group(*pid);
    }
    Ok(())
}

async fn wait_for_shutdown() -> anyhow::Result<()> {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
    Ok(())
}

async fn run_stop(
    config_file: Option<&Path>,
    suffix: Option<&str>,
    volumes: bool,
) -> anyhow::Result<()> {
    let env = build_environment(config_file, suffix)?;
    env.stop(&StopOptions {
        remove_volumes: volumes,
    })
    .await?;
    // An orphaned monitor would later see the stale heartbeat and tear the
    // environment down a second time.
    watchdog::stop_watchdog(env.project_name());
    Ok(())
}

async fn run_restart(config_file: Option<&Path>, suffix: Option<&str>) -> anyhow::Result<()> {
    let env = build_environment(config_file, suffix)?;
    env.restart().await
}

async fn run_watchdog(
    config_file: Option<&Path>,
    project: &str,
    idle_timeout: &str,
) -> anyhow::Result<()> {
    let config_path = config::resolve_config(config_file)?;
    let (config, _source) = config::load_config(&config_path)?;
    let root = config_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| std::path::PathBuf::from("."));

    let idle_timeout = humantime::parse_duration(idle_timeout)?;
    let compose_path = root.join(
        config
            .project
            .compose_file
            .as_deref()
            .unwrap_or("docker-compose.yml"),
    );

    let channel = FileLiveness::for_project(project);
    let compose = StaticComposeFile::new(compose_path);
    watchdog::run_watchdog(
        WatchdogParams {
            project_name: project,
            idle_timeout,
            check_interval: Duration::from_secs(config.watchdog.check_interval_secs),
        },
        &channel,
        &ComposeCli,
        &compose,
    )
    .await
}
