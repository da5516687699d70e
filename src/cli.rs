use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "devdock",
    version,
    about = "Per-worktree local dev environment orchestrator"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Use a specific config file
    #[arg(short = 'f', long = "file", global = true)]
    pub config_file: Option<PathBuf>,

    /// Extra project-name suffix for a parallel isolated environment
    #[arg(long, global = true)]
    pub suffix: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the environment
    Start {
        /// Bring up containers only, skip migrations and everything after
        #[arg(long)]
        up_only: bool,
        /// Exit after migrations complete
        #[arg(long)]
        migrate: bool,
        /// Exit after seeding completes
        #[arg(long)]
        seed: bool,
        /// Tear the environment down instead of starting it
        #[arg(long)]
        down: bool,
        /// Tear down and remove volumes
        #[arg(long)]
        reset: bool,
        /// Skip spawning app dev servers
        #[arg(long)]
        no_servers: bool,
        /// Production mode: build apps and run their prod commands
        #[arg(long)]
        prod: bool,
        /// Skip waiting for service health checks
        #[arg(long)]
        no_wait: bool,
        /// Skip spawning the idle-shutdown watchdog
        #[arg(long)]
        no_watchdog: bool,
    },
    /// Stop the environment
    Stop {
        /// Also remove volumes
        #[arg(long)]
        volumes: bool,
    },
    /// Restart containers without respawning servers
    Restart,
    /// Print resolved environment variables in shell-sourceable form
    Env {
        /// Mode to resolve for: development or production
        #[arg(long, default_value = "development")]
        mode: String,
    },
    /// Validate the config file
    Validate,
    /// Generate a starter devdock.toml
    Init,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
    /// Internal idle-shutdown monitor, spawned by `start`
    #[command(hide = true)]
    Watchdog {
        #[arg(long)]
        project: String,
        #[arg(long, default_value = "1h")]
        idle_timeout: String,
    },
}
