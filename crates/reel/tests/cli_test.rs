//! Integration tests for the `reel` CLI binary.
//!
//! These cover argument parsing, help output, shell completions, config
//! management, and error handling without a live server.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `reel` binary with env isolation.
///
/// Clears all `REEL_*` env vars and points config directories at `home`
/// so tests never touch the user's real configuration.
fn reel_cmd(home: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("reel");
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .env_remove("REEL_PROFILE")
        .env_remove("REEL_SERVER")
        .env_remove("REEL_TOKEN")
        .env_remove("REEL_OUTPUT")
        .env_remove("RUST_LOG");
    cmd
}

fn home() -> TempDir {
    tempfile::tempdir().unwrap()
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = home();
    let output = reel_cmd(&home).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let home = home();
    reel_cmd(&home).arg("--help").assert().success().stdout(
        predicate::str::contains("watch")
            .and(predicate::str::contains("send"))
            .and(predicate::str::contains("config"))
            .and(predicate::str::contains("completions")),
    );
}

#[test]
fn test_version_flag() {
    let home = home();
    reel_cmd(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("reel"));
}

#[test]
fn test_watch_help_lists_options() {
    let home = home();
    reel_cmd(&home)
        .args(["watch", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--once").and(predicate::str::contains("--no-retry")));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    let home = home();
    reel_cmd(&home)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    let home = home();
    reel_cmd(&home)
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let home = home();
    let output = reel_cmd(&home).arg("foobar").output().unwrap();
    assert!(!output.status.success(), "Expected failure for invalid subcommand");
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_invalid_output_format() {
    let home = home();
    let output = reel_cmd(&home)
        .args(["--output", "yaml", "watch", "cinemas"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(
        text.contains("invalid value") || text.contains("possible values"),
        "Expected error about valid output formats:\n{text}"
    );
}

#[test]
fn test_watch_without_server() {
    let home = home();
    reel_cmd(&home)
        .args(["watch", "cinemas"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No server configured"));
}

#[test]
fn test_watch_unknown_profile() {
    let home = home();
    reel_cmd(&home)
        .args(["--profile", "staging", "watch", "cinemas"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Profile 'staging' not found"));
}

#[test]
fn test_watch_rejects_http_server() {
    let home = home();
    reel_cmd(&home)
        .args(["--server", "https://reel.example.com", "watch", "cinemas"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("ws://"));
}

#[test]
fn test_send_invalid_json() {
    let home = home();
    reel_cmd(&home)
        .args(["send", "cinemas", "{oops"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid JSON"));
}

#[test]
fn test_send_non_object_body() {
    let home = home();
    reel_cmd(&home)
        .args(["send", "cinemas", "[1, 2]"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("expected a JSON object"));
}

// ── Config management ───────────────────────────────────────────────

#[test]
fn test_config_path() {
    let home = home();
    reel_cmd(&home)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_show_no_config() {
    // Renders the default config when no file exists.
    let home = home();
    reel_cmd(&home)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default_profile = \"default\""));
}

#[test]
fn test_config_init_requires_server() {
    let home = home();
    reel_cmd(&home)
        .args(["config", "init"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--server"));
}

#[test]
fn test_config_init_then_show() {
    let home = home();
    reel_cmd(&home)
        .args([
            "--profile",
            "local",
            "--server",
            "ws://127.0.0.1:8080/ws",
            "--token",
            "s3cret",
            "config",
            "init",
            "--plaintext-token",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("Profile 'local' written"));

    let output = reel_cmd(&home)
        .args(["--output", "json", "config", "show"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let shown: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(shown["default_profile"], "local");
    assert_eq!(shown["profiles"]["local"]["server"], "ws://127.0.0.1:8080/ws");
    assert_eq!(shown["profiles"]["local"]["token"], "********");
}

#[test]
fn test_config_init_refuses_to_overwrite() {
    let home = home();
    let init = |force: bool| {
        let mut cmd = reel_cmd(&home);
        cmd.args(["--server", "ws://127.0.0.1:8080/ws", "config", "init"]);
        if force {
            cmd.arg("--force");
        }
        cmd.assert()
    };

    init(false).success();
    init(false)
        .code(2)
        .stderr(predicate::str::contains("already exists"));
    init(true).success();
}
