use anyhow::{bail, Result};
use std::path::Path;

use crate::config;
use crate::environment::{EnvOptions, Environment, Mode};
use crate::ui::summary::print_env;

pub fn run(config_file: Option<&Path>, suffix: Option<&str>, mode: &str) -> Result<()> {
    let mode = match mode {
        "development" => Mode::Development,
        "production" => Mode::Production,
        other => bail!("unknown mode '{}' (expected development or production)", other),
    };

    let config_path = config::resolve_config(config_file)?;
    let (config, source) = config::load_config(&config_path)?;
    let root = config_path.parent().map(|p| p.to_path_buf());

    let env = Environment::new(
        config,
        source,
        EnvOptions {
            suffix: suffix.map(|s| s.to_string()),
            root,
        },
    )?;

    print_env(&env.env_vars(mode));
    Ok(())
}
