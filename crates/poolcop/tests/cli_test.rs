//! Integration tests for the `poolcop` CLI binary.
//!
//! Argument parsing, help output, and error handling run without a network.
//! The data commands run against a wiremock stand-in for PoolCopilot.
#![allow(clippy::unwrap_used)]

use std::path::Path;
use std::process::Output;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

const NO_CONFIG: &str = "/tmp/poolcop-cli-test-nonexistent";

/// Build a [`Command`] for the `poolcop` binary with env isolation.
///
/// Clears all `POOLCOP_*` env vars and points config directories at
/// `config_home` so tests never touch the user's real configuration.
fn poolcop_cmd_in(config_home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("poolcop");
    cmd.env("HOME", config_home)
        .env("XDG_CONFIG_HOME", config_home)
        .env("NO_COLOR", "1")
        .env_remove("POOLCOP_PROFILE")
        .env_remove("POOLCOP_API_KEY")
        .env_remove("POOLCOP_BASE_URL")
        .env_remove("POOLCOP_OUTPUT")
        .env_remove("POOLCOP_TIMEOUT")
        .env_remove("POOLCOP_DEFAULT_PROFILE")
        .env_remove("RUST_LOG");
    cmd
}

fn poolcop_cmd() -> assert_cmd::Command {
    poolcop_cmd_in(Path::new(NO_CONFIG))
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// Run a command off the async runtime so the mock server keeps serving.
async fn run(mut cmd: assert_cmd::Command) -> Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

fn status_body() -> serde_json::Value {
    json!({
        "PoolCop": {
            "status": { "pump": 1, "watervalve": 0, "valveposition": 2, "poolcop": 3 },
            "temperature": { "water": 27.5, "air": 19.0 },
            "pH": 7.2,
            "orp": 715,
            "pressure": 120,
            "network": { "version": "44.3.1" },
            "history": { "backwash": "2024-06-01T08:15:00+0200" },
            "conf": { "pH": 1, "orp": 0 }
        }
    })
}

async fn mock_poolcopilot() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "tok-1",
            "expires_in": 900,
            "poolcop": "pc-1234"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/status"))
        .and(header("PoolCop-Token", "tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body()))
        .mount(&server)
        .await;
    server
}

async fn mock_refusing_key() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;
    server
}

/// Command preloaded with the mock's base URL and a key.
fn against(server: &MockServer, config_home: &Path) -> assert_cmd::Command {
    let mut cmd = poolcop_cmd_in(config_home);
    cmd.args([
        "--base-url",
        &format!("{}/api/v1/", server.uri()),
        "--api-key",
        "test-api-key",
    ]);
    cmd
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = poolcop_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    poolcop_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("PoolCop")
            .and(predicate::str::contains("sensors"))
            .and(predicate::str::contains("binary-sensors"))
            .and(predicate::str::contains("setup")),
    );
}

#[test]
fn test_version_flag() {
    poolcop_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("poolcop"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_zsh() {
    poolcop_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_completions_bash() {
    poolcop_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = poolcop_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(text.contains("foobar") || text.contains("unrecognized"), "{text}");
}

#[test]
fn test_sensors_without_credentials() {
    let output = poolcop_cmd().arg("sensors").output().unwrap();
    assert_eq!(output.status.code(), Some(3), "Expected auth exit code");
    assert!(combined_output(&output).contains("No credentials"));
}

#[test]
fn test_unknown_profile() {
    let output = poolcop_cmd()
        .args(["--profile", "nope", "status"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4), "Expected not-found exit code");
    assert!(combined_output(&output).contains("'nope'"));
}

#[test]
fn test_invalid_output_format() {
    let output = poolcop_cmd()
        .args(["--output", "invalid", "sensors"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("possible values"));
}

#[test]
fn test_watch_flags_conflict() {
    let output = poolcop_cmd()
        .args(["watch", "--binary-only", "--sensors-only"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_config_show_no_config() {
    poolcop_cmd().args(["config", "show"]).assert().success();
}

#[test]
fn test_config_profiles_empty() {
    poolcop_cmd()
        .args(["config", "profiles"])
        .assert()
        .success()
        .stderr(predicate::str::contains("No profiles configured"));
}

#[test]
fn test_unreachable_api_is_not_ready() {
    let output = poolcop_cmd()
        .args([
            "--base-url",
            "http://127.0.0.1:9/api/v1/",
            "--api-key",
            "k",
            "--timeout",
            "2",
            "raw",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(7), "{}", combined_output(&output));
}

// ── Against a mock PoolCopilot ──────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_get_resolves_dotted_path() {
    let server = mock_poolcopilot().await;
    let mut cmd = against(&server, Path::new(NO_CONFIG));
    cmd.args(["get", "temperature.water"]);

    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "27.5");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_get_missing_path_is_not_found() {
    let server = mock_poolcopilot().await;
    let mut cmd = against(&server, Path::new(NO_CONFIG));
    cmd.args(["get", "temperature.solar"]);

    let output = run(cmd).await;
    assert_eq!(output.status.code(), Some(4), "{}", combined_output(&output));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sensors_json() {
    let server = mock_poolcopilot().await;
    let mut cmd = against(&server, Path::new(NO_CONFIG));
    cmd.args(["-o", "json", "sensors"]);

    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    let states: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(states.len(), 14);

    let water = states.iter().find(|s| s["key"] == "temperature_water").unwrap();
    assert_eq!(water["entity_id"], "sensor.poolcop_pc-1234_temperature_water");
    assert_eq!(water["state"], "27.5");
    assert_eq!(water["unit"], "°C");

    let refill = states.iter().find(|s| s["key"] == "last_refill").unwrap();
    assert_eq!(refill["state"], "unknown");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_sensors_plain() {
    let server = mock_poolcopilot().await;
    let mut cmd = against(&server, Path::new(NO_CONFIG));
    cmd.args(["-o", "plain", "binary-sensors"]);

    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.lines().any(|l| l == "pump\ton"));
    assert!(stdout.lines().any(|l| l == "watervalve\toff"));
    assert!(stdout.lines().any(|l| l == "aux1\tunknown"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_device_reports_firmware() {
    let server = mock_poolcopilot().await;
    let mut cmd = against(&server, Path::new(NO_CONFIG));
    cmd.args(["-o", "json", "device"]);

    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    let device: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(device["sw_version"], "44.3.1");
    assert_eq!(device["manufacturer"], "PCFR");
    assert_eq!(device["identifiers"][0][1], "pc-1234");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_refused_key_exits_with_auth_code() {
    let server = mock_refusing_key().await;
    let mut cmd = against(&server, Path::new(NO_CONFIG));
    cmd.arg("status");

    let output = run(cmd).await;
    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_setup_saves_profile_once() {
    let server = mock_poolcopilot().await;
    let home = tempfile::tempdir().unwrap();

    let mut cmd = against(&server, home.path());
    cmd.args(["setup", "--plaintext", "--name", "pool"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let mut cmd = poolcop_cmd_in(home.path());
    cmd.args(["config", "profiles"]);
    let output = run(cmd).await;
    assert!(String::from_utf8_lossy(&output.stdout).contains("pool *\tpc-1234"));

    // The saved profile works without flags.
    let mut cmd = poolcop_cmd_in(home.path());
    cmd.args(["get", "pH"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "7.2");

    // Same device under a second name is refused.
    let mut cmd = against(&server, home.path());
    cmd.args(["setup", "--plaintext", "--name", "other"]);
    let output = run(cmd).await;
    assert_eq!(output.status.code(), Some(6), "{}", combined_output(&output));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_setup_with_refused_key_saves_nothing() {
    let server = mock_refusing_key().await;
    let home = tempfile::tempdir().unwrap();

    let mut cmd = against(&server, home.path());
    cmd.args(["setup", "--plaintext"]);
    let output = run(cmd).await;
    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));

    let mut cmd = poolcop_cmd_in(home.path());
    cmd.args(["config", "profiles"]);
    let output = run(cmd).await;
    assert!(combined_output(&output).contains("No profiles configured"));
}
