//! CLI integration tests for the Quay command-line interface.
//!
//! These tests cover argument parsing, help output and the config
//! subcommands. None of them start the server.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for the quay binary, isolated from the user's config.
fn quay(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("quay").unwrap();
    cmd.env("QUAY_CONFIG_DIR", config_dir)
        .env_remove("QUAY_CONFIG")
        .env_remove("RUST_LOG")
        .current_dir(config_dir);
    cmd
}

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("custom.toml");
    fs::write(&path, contents).unwrap();
    path
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_displays() {
    let dir = TempDir::new().unwrap();
    quay(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Quay"))
        .stdout(predicate::str::contains("session engine"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    quay(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("quay"));
}

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    quay(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("--log-dir"));
}

#[test]
fn test_unknown_subcommand_fails() {
    let dir = TempDir::new().unwrap();
    quay(dir.path())
        .arg("serve")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Start Command Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_start_help_lists_overrides() {
    let dir = TempDir::new().unwrap();
    quay(dir.path())
        .args(["start", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--port"))
        .stdout(predicate::str::contains("--bind"))
        .stdout(predicate::str::contains("--secure"))
        .stdout(predicate::str::contains("--ttl"));
}

#[test]
fn test_start_rejects_non_numeric_port() {
    let dir = TempDir::new().unwrap();
    quay(dir.path())
        .args(["start", "--port", "eighty"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_start_rejects_bad_bind_address() {
    let dir = TempDir::new().unwrap();
    quay(dir.path())
        .args(["start", "--bind", "not an address"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid bind address"));
}

#[test]
fn test_start_rejects_invalid_config() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[session]\nttl_secs = 0\n");

    quay(dir.path())
        .arg("--config")
        .arg(&path)
        .arg("start")
        .assert()
        .failure()
        .stderr(predicate::str::contains("session.ttl_secs"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Command Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_show_defaults() {
    let dir = TempDir::new().unwrap();
    quay(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No config files loaded"))
        .stdout(predicate::str::contains("cookie_name = \"sessionID\""))
        .stdout(predicate::str::contains("port = 8080"));
}

#[test]
fn test_config_show_explicit_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[server]\nport = 9001\n[session]\ncookie_name = \"sid\"\n");

    quay(dir.path())
        .arg("--config")
        .arg(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("port = 9001"))
        .stdout(predicate::str::contains("cookie_name = \"sid\""));
}

#[test]
fn test_config_show_json() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[session]\nttl_secs = 120\n");

    let output = quay(dir.path())
        .arg("--config")
        .arg(&path)
        .args(["--json", "config", "show"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["session"]["ttl_secs"], 120);
    assert_eq!(json["server"]["port"], 8080);
}

#[test]
fn test_config_show_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    quay(dir.path())
        .args(["--config", "does-not-exist.toml", "config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist.toml"));
}

#[test]
fn test_config_project_file_discovered() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("quay.toml"), "[server]\nport = 7000\n").unwrap();

    quay(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("port = 7000"));

    quay(dir.path())
        .args(["config", "which"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 config file(s) loaded"));
}

#[test]
fn test_config_init_local() {
    let dir = TempDir::new().unwrap();

    quay(dir.path())
        .args(["config", "init", "--local"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created"));

    let written = fs::read_to_string(dir.path().join("quay.toml")).unwrap();
    assert!(written.contains("[session]"));

    quay(dir.path())
        .args(["config", "init", "--local"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn test_config_path_uses_config_dir() {
    let dir = TempDir::new().unwrap();
    quay(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}
