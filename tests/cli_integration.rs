//! CLI integration tests
//!
//! End-to-end tests for CLI commands using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Get the oracle binary with a clean environment
fn oracle_cmd() -> Command {
    let mut cmd = Command::cargo_bin("oracle").unwrap();
    cmd.env_remove("ORACLE_URL")
        .env_remove("ORACLE_TOKEN")
        .env_remove("ORACLE_PASSWORD")
        .env_remove("ORACLE_LOG_LEVEL")
        .env_remove("ORACLE_LOG_FORMAT")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .args(["--config", "/nonexistent/oracle.toml"]);
    cmd
}

async fn server_with_devices() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "name": "router", "ipv4": "10.0.0.1" },
            { "id": 2, "ipv4": "10.0.0.2", "snmp": true }
        ])))
        .mount(&server)
        .await;
    server
}

#[test]
fn test_version_output() {
    oracle_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("oracle"));
}

#[test]
fn test_help_shows_all_commands() {
    oracle_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("devices"))
        .stdout(predicate::str::contains("settings"))
        .stdout(predicate::str::contains("login"))
        .stdout(predicate::str::contains("watch"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn test_devices_help() {
    oracle_cmd()
        .args(["devices", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("add"))
        .stdout(predicate::str::contains("remove"));
}

#[test]
fn test_config_init_creates_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("oracle.toml");

    oracle_cmd()
        .args(["config", "init", "-o", config_path.to_str().unwrap()])
        .assert()
        .success();

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[server]"));
    assert!(content.contains("base_url"));
}

#[test]
fn test_config_init_no_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("oracle.toml");
    std::fs::write(&config_path, "existing content").unwrap();

    oracle_cmd()
        .args(["config", "init", "-o", config_path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert_eq!(content, "existing content");
}

#[test]
fn test_completions_bash() {
    oracle_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("oracle"));
}

#[test]
fn test_invalid_url_rejected() {
    oracle_cmd()
        .args(["--url", "ftp://oracle", "devices", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("server.base_url"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_devices_list_table() {
    let server = server_with_devices().await;

    oracle_cmd()
        .args(["--url", &server.uri(), "devices", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("router"))
        .stdout(predicate::str::contains("10.0.0.2"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_devices_list_json() {
    let server = server_with_devices().await;

    let output = oracle_cmd()
        .args(["--url", &server.uri(), "devices", "list", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["devices"].as_array().unwrap().len(), 2);
    assert_eq!(parsed["devices"][1]["snmp"], true);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_token_sent_as_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    oracle_cmd()
        .args(["--url", &server.uri(), "--token", "s3cret", "devices", "list"])
        .assert()
        .success();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unauthorized_exits_with_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    oracle_cmd()
        .args(["--url", &server.uri(), "devices", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_login_prints_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "result": "ok", "token": "tok-1" })),
        )
        .mount(&server)
        .await;

    oracle_cmd()
        .args(["--url", &server.uri(), "login", "--name", "admin", "--password", "pw"])
        .assert()
        .success()
        .stdout(predicate::str::diff("tok-1\n"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_config_reported_once_logging_is_up() {
    let server = server_with_devices().await;

    oracle_cmd()
        .env("ORACLE_LOG_LEVEL", "debug")
        .env("ORACLE_LOG_FORMAT", "json")
        .args(["--url", &server.uri(), "devices", "list"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Config file not found, using defaults"))
        .stderr(predicate::str::contains("/nonexistent/oracle.toml"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_log_level_flag_overrides_env() {
    let server = server_with_devices().await;

    oracle_cmd()
        .env("ORACLE_LOG_LEVEL", "debug")
        .args(["--url", &server.uri(), "--log-level", "error", "devices", "list"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Config file not found").not());
}
