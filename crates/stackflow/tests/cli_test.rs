#![allow(deprecated)] // TODO: move from cargo_bin to the cargo_bin_cmd! macro

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

const CHAIN: &str = include_str!("../../../demos/chain.json");
const GROUPS: &str = include_str!("../../../demos/groups.yaml");

const DANGLING: &str = r#"{
  "name": "broken",
  "resources": {
    "public": {
      "class": "subnet",
      "name": "public",
      "cidr_block": "10.0.1.0/24",
      "availability_zone": "us-east-1a",
      "network": { "ref": ["missing", "id"] }
    }
  }
}"#;

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn stackflow(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("stackflow").unwrap();
    cmd.current_dir(dir)
        .env_remove("STACKFLOW_CONFIG_PATH")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("stackflow").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("stackflow").unwrap();
    cmd.arg("invalid-command").assert().failure();
}

/// validate prints dependencies before their dependents
#[test]
fn test_validate_prints_order() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "chain.json", CHAIN);

    stackflow(dir.path())
        .arg("validate")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Definition is valid"))
        .stdout(predicate::str::contains("1. main (network)"))
        .stdout(predicate::str::contains("2. public (subnet)"))
        .stdout(predicate::str::contains("3. app (instance)"));
}

#[test]
fn test_validate_dangling_reference() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "broken.json", DANGLING);

    stackflow(dir.path())
        .arg("validate")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Dangling reference"));
}

#[test]
fn test_validate_missing_file() {
    let dir = tempfile::tempdir().unwrap();

    stackflow(dir.path())
        .arg("validate")
        .arg("nope.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}

/// Mutually referencing groups are created and then attached
#[test]
fn test_plan_yaml_groups() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "groups.yaml", GROUPS);

    stackflow(dir.path())
        .arg("plan")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("3 to create"))
        .stdout(predicate::str::contains("web.ingress.from-db.security_groups = \"3\""))
        .stdout(predicate::str::contains("db.ingress.from-web.security_groups = \"2\""));
}

#[test]
fn test_plan_save_writes_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "chain.json", CHAIN);

    stackflow(dir.path())
        .arg("plan")
        .arg(&file)
        .arg("--save")
        .assert()
        .success()
        .stdout(predicate::str::contains("Checkpoint saved"));

    let state = dir.path().join(".stackflow").join("state.json");
    let checkpoint: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(state).unwrap()).unwrap();
    assert_eq!(checkpoint["created"].as_array().unwrap().len(), 3);
    assert_eq!(
        checkpoint["definition"]["resources"]["public"]["network"]["value"],
        serde_json::json!("1")
    );
    assert!(!dir.path().join(".stackflow").join("lock.json").exists());
}

/// The configured state directory is honored
#[test]
fn test_plan_save_uses_config() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "chain.json", CHAIN);
    write(dir.path(), "stackflow.yaml", "state:\n  directory: checkpoints\n");

    stackflow(dir.path())
        .arg("plan")
        .arg(&file)
        .arg("--save")
        .assert()
        .success();

    assert!(dir.path().join("checkpoints").join("state.json").exists());
}

#[test]
fn test_plan_pass_bound_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "chain.json", CHAIN);
    let config = write(dir.path(), "custom.yaml", "executor:\n  max_passes: 1\n");

    stackflow(dir.path())
        .env("STACKFLOW_CONFIG_PATH", &config)
        .arg("plan")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("did not converge"));
}

#[test]
fn test_config_shows_effective_values() {
    let dir = tempfile::tempdir().unwrap();
    let config = write(dir.path(), "custom.yaml", "executor:\n  max_passes: 7\n");

    stackflow(dir.path())
        .env("STACKFLOW_CONFIG_PATH", &config)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.yaml"))
        .stdout(predicate::str::contains("max_passes: 7"))
        .stdout(predicate::str::contains("directory: .stackflow"));
}
