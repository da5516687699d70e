//! The long-lived environment facade.
//!
//! Constructed once from a validated config, it computes identity, ports
//! and URLs eagerly and hands lifecycle operations to the controller with
//! its collaborators attached.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use crate::config::model::DevConfig;
use crate::config::validate::{validate, ConfigError};
use crate::config::CONFIG_FILENAME;
use crate::discovery::env::build_env_vars;
use crate::discovery::network::detect_local_ip;
use crate::discovery::ports::{compute_ports, ComputedPorts};
use crate::discovery::urls::{compute_urls, ComputedUrls};
use crate::identity::{compute_identity, DevIdentity};
use crate::lifecycle::{LifecycleController, StartOptions, StopOptions};
use crate::runtime::{
    compose::ComposeCli, exec::ShellExec, ComposeFileProvider, ContainerRuntime, Exec,
    ProcessSpawner, StaticComposeFile,
};

const DEFAULT_COMPOSE_FILE: &str = "docker-compose.yml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Development,
    Production,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnvOptions {
    /// Extra name suffix, always ahead of any worktree-derived suffix.
    pub suffix: Option<String>,
    /// Explicit project root; otherwise discovered from the cwd.
    pub root: Option<PathBuf>,
}

/// External collaborators, swappable for tests.
#[derive(Clone)]
pub struct Collaborators {
    pub runtime: Arc<dyn ContainerRuntime>,
    pub compose: Arc<dyn ComposeFileProvider>,
    pub exec: Arc<dyn Exec>,
    pub spawner: Arc<dyn ProcessSpawner>,
}

pub struct Environment {
    config: DevConfig,
    source: String,
    options: EnvOptions,
    identity: DevIdentity,
    ports: ComputedPorts,
    urls: ComputedUrls,
    local_ip: String,
    public_urls: BTreeMap<String, String>,
    collaborators: Collaborators,
}

impl Environment {
    /// Build a facade with the production collaborators. `source` is the
    /// raw TOML, kept for diagnostic spans.
    pub fn new(config: DevConfig, source: String, options: EnvOptions) -> Result<Self> {
        let identity = derive_identity(&config, &options);
        let compose_path = identity.root.join(
            config
                .project
                .compose_file
                .as_deref()
                .unwrap_or(DEFAULT_COMPOSE_FILE),
        );
        let collaborators = Collaborators {
            runtime: Arc::new(ComposeCli),
            compose: Arc::new(StaticComposeFile::new(compose_path)),
            exec: Arc::new(ShellExec),
            spawner: Arc::new(ShellExec),
        };
        Self::with_collaborators(config, source, options, collaborators)
    }

    pub fn with_collaborators(
        config: DevConfig,
        source: String,
        options: EnvOptions,
        collaborators: Collaborators,
    ) -> Result<Self> {
        validate(&config, &source, CONFIG_FILENAME)
            .map_err(|problems| ConfigError { problems })?;

        let identity = derive_identity(&config, &options);
        let ports = compute_ports(&config.services, &config.apps, identity.port_offset);
        let local_ip = detect_local_ip();
        let urls = compute_urls(&config.services, &config.apps, &ports, &local_ip);

        Ok(Self {
            config,
            source,
            options,
            identity,
            ports,
            urls,
            local_ip,
            public_urls: BTreeMap::new(),
            collaborators,
        })
    }

    /// A new facade re-derived with a different suffix. The original is
    /// untouched; this supports parallel isolated environments.
    pub fn with_suffix(&self, suffix: &str) -> Result<Self> {
        let options = EnvOptions {
            suffix: Some(suffix.to_string()),
            root: Some(self.identity.root.clone()),
        };
        Self::with_collaborators(
            self.config.clone(),
            self.source.clone(),
            options,
            self.collaborators.clone(),
        )
    }

    pub fn config(&self) -> &DevConfig {
        &self.config
    }

    pub fn identity(&self) -> &DevIdentity {
        &self.identity
    }

    pub fn project_name(&self) -> &str {
        &self.identity.project_name
    }

    pub fn ports(&self) -> &ComputedPorts {
        &self.ports
    }

    pub fn urls(&self) -> &ComputedUrls {
        &self.urls
    }

    pub fn local_ip(&self) -> &str {
        &self.local_ip
    }

    pub fn public_urls(&self) -> &BTreeMap<String, String> {
        &self.public_urls
    }

    /// Replace the public-URL map wholesale. No partial update API.
    pub fn set_public_urls(&mut self, urls: BTreeMap<String, String>) {
        self.public_urls = urls;
    }

    pub fn clear_public_urls(&mut self) {
        self.public_urls.clear();
    }

    /// The env-var map injected into every spawned process and hook.
    pub fn env_vars(&self, mode: Mode) -> BTreeMap<String, String> {
        build_env_vars(
            &self.identity.project_name,
            mode.as_str(),
            &self.ports,
            &self.urls,
            &self.public_urls,
            &self.config.env,
        )
    }

    fn controller(&self) -> LifecycleController<'_> {
        LifecycleController {
            config: &self.config,
            project_name: &self.identity.project_name,
            root: &self.identity.root,
            ports: &self.ports,
            runtime: self.collaborators.runtime.as_ref(),
            compose: self.collaborators.compose.as_ref(),
            exec: self.collaborators.exec.as_ref(),
            spawner: self.collaborators.spawner.as_ref(),
        }
    }

    pub async fn start(&self, opts: &StartOptions) -> Result<Option<BTreeMap<String, u32>>> {
        let mode = if opts.production {
            Mode::Production
        } else {
            Mode::Development
        };
        let env = self.env_vars(mode);
        self.controller().start(opts, &env).await
    }

    pub async fn stop(&self, opts: &StopOptions) -> Result<()> {
        let env = self.env_vars(Mode::Development);
        self.controller().stop(opts, &env).await
    }

    pub async fn restart(&self) -> Result<()> {
        let env = self.env_vars(Mode::Development);
        self.controller().restart(&env).await
    }

    pub async fn is_running(&self) -> Result<bool> {
        self.controller().is_running().await
    }
}

fn derive_identity(config: &DevConfig, options: &EnvOptions) -> DevIdentity {
    compute_identity(
        &config.project.prefix,
        options.suffix.as_deref(),
        options.root.as_deref(),
        config.project.worktree_isolation,
    )
}
