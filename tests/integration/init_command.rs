use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn init_writes_starter_config() {
    let dir = tempfile::tempdir().unwrap();

    Command::cargo_bin("devdock")
        .unwrap()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created devdock.toml"));

    let content = std::fs::read_to_string(dir.path().join("devdock.toml")).unwrap();
    assert!(content.contains("[project]"));
    assert!(content.contains("prefix = "));

    // The starter config parses and validates.
    let config: devdock::config::model::DevConfig = toml::from_str(&content).unwrap();
    assert!(devdock::config::validate::validate(&config, &content, "devdock.toml").is_ok());
}

#[test]
fn init_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("devdock.toml"), "[project]\nprefix = \"x\"\n").unwrap();

    Command::cargo_bin("devdock")
        .unwrap()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}
