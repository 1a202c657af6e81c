//! Integration tests for the `crowdlens` CLI binary.
//!
//! Argument parsing, help output, completions and error handling run
//! without a backend; the session tests point the binary at a wiremock
//! server.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `crowdlens` binary with env isolation.
///
/// Clears all `CROWDLENS_*` env vars and points config and data
/// directories at `home` so tests never touch the user's real state.
fn crowdlens_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("crowdlens");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("CROWDLENS_PROFILE")
        .env_remove("CROWDLENS_API_URL")
        .env_remove("CROWDLENS_SOCKET_URL")
        .env_remove("CROWDLENS_OUTPUT")
        .env_remove("CROWDLENS_INSECURE")
        .env_remove("CROWDLENS_TIMEOUT")
        .env_remove("CROWDLENS_LOG_FILE")
        .env_remove("CROWDLENS_PASSWORD");
    cmd
}

/// Same, already pointed at `server` with a closed realtime port.
fn backend_cmd(home: &Path, server: &MockServer) -> assert_cmd::Command {
    let mut cmd = crowdlens_cmd(home);
    cmd.args([
        "--api-url",
        &format!("{}/api", server.uri()),
        "--socket-url",
        "http://127.0.0.1:9",
        "--timeout",
        "5s",
    ]);
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

async fn mount_backend(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "tok-cli",
            "user": {"id": 3, "email": "ops@example.com", "name": "Ops"}
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/sites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"siteId": "s1", "name": "Mall"},
            {"siteId": "s2", "name": "Stadium"}
        ])))
        .mount(server)
        .await;
}

fn login(home: &Path, server: &MockServer) {
    backend_cmd(home, server)
        .args(["login", "--email", "ops@example.com", "--password-stdin"])
        .write_stdin("s3cret\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged in as Ops"));
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = crowdlens_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let home = tempfile::tempdir().unwrap();
    crowdlens_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("login")
                .and(predicate::str::contains("sites"))
                .and(predicate::str::contains("overview"))
                .and(predicate::str::contains("live")),
        );
}

#[test]
fn test_version_flag() {
    let home = tempfile::tempdir().unwrap();
    crowdlens_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("crowdlens"));
}

#[test]
fn test_completions_zsh() {
    let home = tempfile::tempdir().unwrap();
    crowdlens_cmd(home.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_live_subcommands_exist() {
    let home = tempfile::tempdir().unwrap();
    crowdlens_cmd(home.path())
        .args(["live", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("alerts").and(predicate::str::contains("occupancy")));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let home = tempfile::tempdir().unwrap();
    let output = crowdlens_cmd(home.path()).arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_sites_without_config() {
    let home = tempfile::tempdir().unwrap();
    crowdlens_cmd(home.path())
        .args(["sites", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config init"));
}

#[test]
fn test_unknown_profile() {
    let home = tempfile::tempdir().unwrap();
    crowdlens_cmd(home.path())
        .args(["--profile", "nope", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Profile 'nope' not found"));
}

#[test]
fn test_config_show_no_config() {
    // `config show` falls back to the default config when no file exists.
    let home = tempfile::tempdir().unwrap();
    crowdlens_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[defaults]"));
}

#[test]
fn test_invalid_output_format() {
    let home = tempfile::tempdir().unwrap();
    let output = crowdlens_cmd(home.path())
        .args(["--output", "invalid", "status"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("invalid") || text.contains("possible values"),
        "Expected error about valid output formats:\n{text}"
    );
}

#[test]
fn test_overview_requires_login() {
    let home = tempfile::tempdir().unwrap();
    crowdlens_cmd(home.path())
        .args(["--api-url", "http://127.0.0.1:9/api", "overview"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Not logged in"));
}

#[test]
fn test_bad_date_is_a_usage_error() {
    let home = tempfile::tempdir().unwrap();
    crowdlens_cmd(home.path())
        .args(["--api-url", "http://127.0.0.1:9/api", "entries", "--date", "15/03/2024"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("YYYY-MM-DD"));
}

// ── Session against a mock backend ──────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_login_persists_session_across_invocations() {
    let server = MockServer::start().await;
    mount_backend(&server).await;
    let home = tempfile::tempdir().unwrap();

    login(home.path(), &server);

    let output = backend_cmd(home.path(), &server)
        .args(["--output", "json", "status"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let status: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["authenticated"], true);
    assert_eq!(status["user"], "Ops");
    assert_eq!(status["site_id"], "s1");
    assert_eq!(status["known_sites"], 2);

    backend_cmd(home.path(), &server)
        .args(["--output", "plain", "sites", "list"])
        .assert()
        .success()
        .stdout(predicate::str::diff("s1\ns2\n"));

    backend_cmd(home.path(), &server)
        .args(["sites", "select", "s2"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Stadium"));

    backend_cmd(home.path(), &server)
        .args(["--output", "plain", "sites", "current"])
        .assert()
        .success()
        .stdout(predicate::str::contains("s2"));

    backend_cmd(home.path(), &server)
        .arg("logout")
        .assert()
        .success()
        .stderr(predicate::str::contains("Logged out"));

    backend_cmd(home.path(), &server)
        .args(["sites", "list"])
        .assert()
        .code(3);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_login_rejected_shows_backend_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid password"})),
        )
        .mount(&server)
        .await;
    let home = tempfile::tempdir().unwrap();

    backend_cmd(home.path(), &server)
        .args(["login", "--email", "ops@example.com", "--password-stdin"])
        .write_stdin("wrong\n")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Invalid password"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_site_is_not_found() {
    let server = MockServer::start().await;
    mount_backend(&server).await;
    let home = tempfile::tempdir().unwrap();
    login(home.path(), &server);

    backend_cmd(home.path(), &server)
        .args(["sites", "select", "s9"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("sites list"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_entries_waits_for_site_hydration() {
    let server = MockServer::start().await;
    // Sites are unavailable during login, so nothing is stored.
    Mock::given(method("GET"))
        .and(path("/api/sites"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_backend(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/analytics/entry-exit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [{"personName": "Ravi", "gender": "male"}],
            "totalPages": 1
        })))
        .mount(&server)
        .await;
    let home = tempfile::tempdir().unwrap();
    login(home.path(), &server);

    backend_cmd(home.path(), &server)
        .args(["--output", "plain", "entries", "--date", "2024-03-15", "--strict"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ravi"));
}
