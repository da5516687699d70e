#![allow(dead_code)]
use std::path::PathBuf;
use tempfile::TempDir;

pub struct TestProject {
    pub dir: TempDir,
    pub config_path: PathBuf,
}

impl TestProject {
    pub fn new(config_toml: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("devdock.toml");
        std::fs::write(&config_path, config_toml).unwrap();
        Self { dir, config_path }
    }
}

pub const MINIMAL_CONFIG: &str = r#"
[project]
prefix = "test"

[services.postgres]
port = 5432
database = "app"

[apps.web]
port = 3000
dev = "echo dev"
"#;
