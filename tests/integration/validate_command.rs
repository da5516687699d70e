use assert_cmd::Command;
use predicates::prelude::*;

use crate::common::{TestProject, MINIMAL_CONFIG};

#[test]
fn validate_accepts_minimal_config() {
    let project = TestProject::new(MINIMAL_CONFIG);

    Command::cargo_bin("devdock")
        .unwrap()
        .args(["validate", "-f", project.config_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
}

#[test]
fn validate_reports_every_violation() {
    let project = TestProject::new(
        r#"
        [project]
        prefix = "Bad_Prefix"

        [services.api]
        port = 0

        [apps.api]
        port = 3000
        dev = ""
    "#,
    );

    Command::cargo_bin("devdock")
        .unwrap()
        .args(["validate", "-f", project.config_path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid_prefix"))
        .stderr(predicate::str::contains("port_zero"))
        .stderr(predicate::str::contains("duplicate_name"));
}

#[test]
fn validate_fails_without_config() {
    let dir = tempfile::tempdir().unwrap();

    Command::cargo_bin("devdock")
        .unwrap()
        .current_dir(dir.path())
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("devdock.toml"));
}
