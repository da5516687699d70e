pub mod model;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use model::DevConfig;

pub const CONFIG_FILENAME: &str = "devdock.toml";

/// Load and parse a config file, returning the parsed model together with
/// the raw source text (kept for diagnostic spans).
pub fn load_config(path: &Path) -> Result<(DevConfig, String)> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let config: DevConfig = toml::from_str(&content)
        .with_context(|| format!("parsing config file {}", path.display()))?;
    Ok((config, content))
}

/// Walk up the directory tree from `start`, checking for `filename` at each
/// level. Returns the full path if found.
pub fn find_config(start: &Path, filename: &str) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(filename);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Resolve the config file path. An explicit CLI path must exist; otherwise
/// search upward from the current working directory.
pub fn resolve_config(cli_file: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = cli_file {
        if path.is_file() {
            return Ok(path.canonicalize()?);
        }
        bail!("config file not found: {}", path.display());
    }

    let cwd = std::env::current_dir()?;
    find_config(&cwd, CONFIG_FILENAME).ok_or_else(|| {
        anyhow::anyhow!(
            "no {} found in {} or any parent directory",
            CONFIG_FILENAME,
            cwd.display()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn config_in_current_dir_found() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, "").unwrap();
        assert_eq!(find_config(tmp.path(), CONFIG_FILENAME), Some(path));
    }

    #[test]
    fn config_in_parent_dir_found() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, "").unwrap();
        let child = tmp.path().join("subdir");
        fs::create_dir(&child).unwrap();
        assert_eq!(find_config(&child, CONFIG_FILENAME), Some(path));
    }

    #[test]
    fn load_reports_parse_errors() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, "not toml [").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn load_returns_source_text() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        let text = "[project]\nprefix = \"t\"\n";
        fs::write(&path, text).unwrap();
        let (config, source) = load_config(&path).unwrap();
        assert_eq!(config.project.prefix, "t");
        assert_eq!(source, text);
    }
}
