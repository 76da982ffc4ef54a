//! CLI integration tests for schema-refresh.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for configuration errors. None of them reach a database.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the schema-refresh binary.
fn cmd() -> Command {
    Command::cargo_bin("schema-refresh").unwrap()
}

fn config_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("plan"));
}

#[test]
fn test_run_subcommand_help() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--workers"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("schema-refresh"));
}

#[test]
fn test_global_flags_listed() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

#[test]
fn test_missing_subcommand_fails() {
    cmd().assert().failure();
}

// =============================================================================
// Configuration Error Tests
// =============================================================================

#[test]
fn test_missing_config_file() {
    cmd()
        .args(["--config", "/nonexistent/refresh.yaml", "plan"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("IO error"));
}

#[test]
fn test_invalid_yaml() {
    let file = config_file("source: [unterminated");
    cmd()
        .args(["--config", file.path().to_str().unwrap(), "run"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("YAML error"));
}

#[test]
fn test_missing_db_link_across_instances() {
    let file = config_file(
        r#"
source:
  host: prod-db
  service_name: PROD
  user: app
  password: secret
  schema: APP
target:
  host: test-db
  service_name: TEST
  user: app
  password: secret
  schema: APP
"#,
    );
    cmd()
        .args(["--config", file.path().to_str().unwrap(), "plan"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("db_link is required"));
}

#[test]
fn test_zero_workers_override_rejected() {
    let file = config_file(
        r#"
source:
  host: db
  service_name: ORCL
  user: app
  password: secret
  schema: APP
target:
  host: db
  service_name: ORCL
  user: app
  password: secret
  schema: APP_TEST
"#,
    );
    cmd()
        .args(["--config", file.path().to_str().unwrap(), "run", "--workers", "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("refresh.workers must be at least 1"));
}

#[test]
fn test_unknown_log_format_rejected() {
    cmd()
        .args(["--log-format", "xml", "plan"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown log format"));
}
