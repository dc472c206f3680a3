//! Integration tests for the `ambutrack` CLI binary.
//!
//! These tests validate argument parsing, help output, shell completions,
//! exit codes, and the one-shot fetch against a mock dispatch service.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

const NO_CONFIG_HOME: &str = "/tmp/ambutrack-cli-test-nonexistent";

/// Build a [`Command`] for the `ambutrack` binary with env isolation.
///
/// Clears all `AMBUTRACK_*` env vars and points config directories at
/// `home` so tests never touch the user's real configuration.
fn ambutrack_in(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("ambutrack");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("AMBUTRACK_PROFILE")
        .env_remove("AMBUTRACK_API_URL")
        .env_remove("AMBUTRACK_SOCKET_URL")
        .env_remove("AMBUTRACK_TOKEN")
        .env_remove("AMBUTRACK_OUTPUT")
        .env_remove("AMBUTRACK_INSECURE")
        .env_remove("AMBUTRACK_TIMEOUT");
    cmd
}

fn ambutrack_cmd() -> assert_cmd::Command {
    ambutrack_in(Path::new(NO_CONFIG_HOME))
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// Run the binary off the async runtime so a mock server can answer it.
async fn run_blocking(mut cmd: assert_cmd::Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = ambutrack_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    ambutrack_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("ambulance")
            .and(predicate::str::contains("online"))
            .and(predicate::str::contains("watch"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_version_flag() {
    ambutrack_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ambutrack"));
}

#[test]
fn test_token_value_is_not_shown_in_help() {
    ambutrack_cmd()
        .env("AMBUTRACK_TOKEN", "super-secret-token")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("super-secret-token").not());
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    ambutrack_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    ambutrack_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ambutrack"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = ambutrack_cmd().arg("foobar").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_invalid_output_format() {
    let output = ambutrack_cmd()
        .args(["--output", "invalid", "online"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(
        text.contains("invalid") || text.contains("possible values"),
        "Expected error about valid output formats:\n{text}"
    );
}

#[test]
fn test_online_without_config_points_at_init() {
    ambutrack_cmd()
        .arg("online")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("config init"));
}

#[test]
fn test_unknown_profile_is_reported() {
    ambutrack_cmd()
        .args(["--profile", "night-shift", "online"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("night-shift"));
}

#[test]
fn test_invalid_api_url_is_usage_error() {
    ambutrack_cmd()
        .args(["--api-url", "not a url", "online"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("api_url"));
}

#[test]
fn test_watch_without_token_exits_with_auth_code() {
    ambutrack_cmd()
        .args(["--api-url", "http://127.0.0.1:9", "watch", "--once"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No authentication token found"));
}

#[test]
fn test_online_unreachable_service_exits_with_connection_code() {
    ambutrack_cmd()
        .args([
            "--api-url",
            "http://127.0.0.1:9",
            "--token",
            "t",
            "--timeout",
            "5",
            "online",
        ])
        .assert()
        .code(7);
}

// ── One-shot fetch against a mock service ───────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_online_renders_fleet_as_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/ambulance/online"))
        .and(header("authorization", "Bearer cli-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 200,
            "message": "Online ambulances",
            "data": [
                {"id": "A1", "latitude": 14.6, "longitude": 121.0, "status": "busy"},
                {"ambulance_id": "B2", "lat": 14.5, "lng": 120.9}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut cmd = ambutrack_cmd();
    cmd.args([
        "--api-url",
        &server.uri(),
        "--token",
        "cli-token",
        "-o",
        "json-compact",
        "online",
    ]);
    let output = run_blocking(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let fleet: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let fleet = fleet.as_array().unwrap();
    assert_eq!(fleet.len(), 2);
    assert_eq!(fleet[0]["id"], "A1");
    assert_eq!(fleet[0]["status"], "busy");
    assert_eq!(fleet[1]["id"], "B2");
    assert_eq!(fleet[1]["latitude"], 14.5);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_online_plain_lists_ids() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/ambulance/online"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "B2"},
            {"id": "A1"}
        ])))
        .mount(&server)
        .await;

    let mut cmd = ambutrack_cmd();
    cmd.args(["--api-url", &server.uri(), "--token", "t", "-o", "plain", "online"]);
    let output = run_blocking(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "A1\nB2\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_online_rejected_token_exits_with_auth_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/ambulance/online"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "status": 401,
            "message": "Token expired"
        })))
        .mount(&server)
        .await;

    let mut cmd = ambutrack_cmd();
    cmd.args(["--api-url", &server.uri(), "--token", "stale", "online"]);
    let output = run_blocking(cmd).await;

    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("Authentication failed"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_online_server_error_reports_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/ambulance/online"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "status": 500,
            "message": "Fleet registry unavailable"
        })))
        .mount(&server)
        .await;

    let mut cmd = ambutrack_cmd();
    cmd.args(["--api-url", &server.uri(), "--token", "t", "online"]);
    let output = run_blocking(cmd).await;

    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("Fleet registry unavailable"));
}

// ── Config subcommands ──────────────────────────────────────────────

#[test]
fn test_config_subcommands_exist() {
    ambutrack_cmd().args(["config", "--help"]).assert().success().stdout(
        predicate::str::contains("init")
            .and(predicate::str::contains("show"))
            .and(predicate::str::contains("path"))
            .and(predicate::str::contains("set-token"))
            .and(predicate::str::contains("clear-token"))
            .and(predicate::str::contains("use")),
    );
}

#[test]
fn test_config_show_no_config() {
    // `config show` renders the defaults when no config file exists.
    ambutrack_cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default_profile"));
}

#[test]
fn test_config_path_names_toml_file() {
    ambutrack_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[cfg(target_os = "linux")]
fn write_config(home: &Path, contents: &str) -> std::path::PathBuf {
    let dir = home.join("ambutrack");
    std::fs::create_dir_all(&dir).unwrap();
    let file = dir.join("config.toml");
    std::fs::write(&file, contents).unwrap();
    file
}

#[cfg(target_os = "linux")]
const TWO_PROFILES: &str = r#"
default_profile = "day"

[profiles.day]
api_url = "http://127.0.0.1:9"
token = "plain-day-token"

[profiles.night]
api_url = "http://127.0.0.1:9"
"#;

#[cfg(target_os = "linux")]
#[test]
fn test_config_use_switches_default_profile() {
    let home = tempfile::tempdir().unwrap();
    let file = write_config(home.path(), TWO_PROFILES);

    ambutrack_in(home.path())
        .args(["config", "use", "night"])
        .assert()
        .success();

    let saved = std::fs::read_to_string(file).unwrap();
    assert!(saved.contains("default_profile = \"night\""), "{saved}");
}

#[cfg(target_os = "linux")]
#[test]
fn test_config_use_unknown_profile_fails() {
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), TWO_PROFILES);

    ambutrack_in(home.path())
        .args(["config", "use", "weekend"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("day, night"));
}

#[cfg(target_os = "linux")]
#[test]
fn test_config_show_masks_plaintext_tokens() {
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), TWO_PROFILES);

    ambutrack_in(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[profiles.day]")
                .and(predicate::str::contains("****"))
                .and(predicate::str::contains("plain-day-token").not()),
        );
}

#[cfg(target_os = "linux")]
#[test]
fn test_set_token_plaintext_writes_profile() {
    let home = tempfile::tempdir().unwrap();
    let file = write_config(home.path(), TWO_PROFILES);

    ambutrack_in(home.path())
        .args(["--profile", "night", "config", "set-token", "night-token", "--plaintext"])
        .assert()
        .success();

    let saved = std::fs::read_to_string(file).unwrap();
    assert!(saved.contains("night-token"), "{saved}");
}

#[test]
fn test_set_token_rejects_empty_value() {
    ambutrack_cmd()
        .args(["config", "set-token", "  ", "--plaintext"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("token cannot be empty"));
}
