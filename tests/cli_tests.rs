//! End-to-end checks of the `studiosync` binary that need no backend.

mod support;

use assert_cmd::Command;
use predicates::prelude::*;
use support::config::{write_temp_config, VALID_TOML};

fn studiosync() -> Command {
    let mut cmd = Command::cargo_bin("studiosync").unwrap();
    cmd.env_remove("STUDIOSYNC_API_TOKEN")
        .env("NO_COLOR", "1")
        .env("RUST_LOG", "off");
    cmd
}

#[test]
fn help_lists_commands() {
    studiosync()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("leads"))
        .stdout(predicate::str::contains("summary"))
        .stdout(predicate::str::contains("watch"));
}

#[test]
fn validate_accepts_good_file() {
    let (_dir, path) = write_temp_config(VALID_TOML);

    studiosync()
        .args(["config", "validate", "-c"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Config file is valid"));
}

#[test]
fn validate_json_reports_warnings() {
    let (_dir, path) = write_temp_config(VALID_TOML);

    let assert = studiosync()
        .args(["--json", "config", "validate", "-c"])
        .arg(&path)
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let report: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(report["valid"], true);
    let warnings = report["warnings"].as_array().unwrap();
    assert!(warnings
        .iter()
        .any(|w| w.as_str().unwrap().contains("STUDIOSYNC_API_TOKEN")));
}

#[test]
fn validate_names_bad_field() {
    let toml = VALID_TOML.replace("format = \"json\"", "format = \"xml\"");
    let (_dir, path) = write_temp_config(&toml);

    studiosync()
        .args(["config", "validate", "-c"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("logging.format"));
}

#[test]
fn missing_config_file_fails() {
    let dir = tempfile::tempdir().unwrap();

    studiosync()
        .args(["config", "show", "-c"])
        .arg(dir.path().join("nope.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read config file"));
}

#[test]
fn show_prints_effective_values() {
    let (_dir, path) = write_temp_config(VALID_TOML);

    studiosync()
        .args(["config", "show", "-c"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("https://crm.example.com"));
}

#[test]
fn unknown_status_is_rejected_by_parser() {
    studiosync()
        .args(["leads", "status", "1", "archived"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("archived"));
}
