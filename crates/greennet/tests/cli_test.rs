//! Integration tests for the `greennet` CLI binary.
//!
//! Argument parsing, help output, shell completions, config handling and
//! error exit codes, all without a broker.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `greennet` binary with env isolation.
///
/// Clears all `GREENNET_*` env vars and points config directories at
/// `home` so tests never touch the user's real configuration.
fn greennet_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("greennet");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home)
        .env_remove("GREENNET_PROFILE")
        .env_remove("GREENNET_HOST")
        .env_remove("GREENNET_PORT")
        .env_remove("GREENNET_GATEWAY")
        .env_remove("GREENNET_OUTPUT")
        .env_remove("GREENNET_TIMEOUT")
        .env_remove("GREENNET_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(home: &Path, contents: &str) {
    let dir = home.join("greennet");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), contents).unwrap();
}

const LAB_CONFIG: &str = r#"
default_profile = "lab"

[profiles.lab]
host = "broker.lab"
gateway_id = "GW-LAB"
password = "hunter2"
username = "mqtt"

[profiles.home]
host = "broker.home"
port = 8883
gateway_id = "GW-HOME"
"#;

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn no_args_shows_usage() {
    let home = tempfile::tempdir().unwrap();
    greennet_cmd(home.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    greennet_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("EnOcean")
            .and(predicate::str::contains("devices"))
            .and(predicate::str::contains("send"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn version_flag() {
    let home = tempfile::tempdir().unwrap();
    greennet_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("greennet"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn completions_zsh() {
    let home = tempfile::tempdir().unwrap();
    greennet_cmd(home.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn completions_bash() {
    let home = tempfile::tempdir().unwrap();
    greennet_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Argument validation ─────────────────────────────────────────────

#[test]
fn raw_function_needs_key_value() {
    let home = tempfile::tempdir().unwrap();
    greennet_cmd(home.path())
        .args(["send", "0528C9BA", "raw", "dimValue"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("key=value"));
}

#[test]
fn unknown_profile_filter_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    greennet_cmd(home.path())
        .args(["devices", "list", "--profile-filter", "toaster"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown profile"));
}

// ── Missing configuration ───────────────────────────────────────────

#[test]
fn devices_list_without_gateway_is_usage_error() {
    let home = tempfile::tempdir().unwrap();
    greennet_cmd(home.path())
        .args(["devices", "list"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("config init"));
}

#[test]
fn unknown_profile_is_not_found() {
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), LAB_CONFIG);
    greennet_cmd(home.path())
        .args(["--profile", "office", "system", "info"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("office"));
}

// ── Config commands ─────────────────────────────────────────────────

#[test]
fn config_show_masks_password() {
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), LAB_CONFIG);
    greennet_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[profiles.lab]")
                .and(predicate::str::contains("password = \"****\""))
                .and(predicate::str::contains("hunter2").not()),
        );
}

#[test]
fn config_profiles_plain_lists_names() {
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), LAB_CONFIG);
    greennet_cmd(home.path())
        .args(["config", "profiles", "-o", "plain"])
        .assert()
        .success()
        .stdout("home\nlab\n");
}

#[test]
fn config_use_switches_default() {
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), LAB_CONFIG);
    greennet_cmd(home.path())
        .args(["config", "use", "home"])
        .assert()
        .success();

    let saved = std::fs::read_to_string(home.path().join("greennet").join("config.toml")).unwrap();
    assert!(saved.contains("default_profile = \"home\""), "{saved}");

    greennet_cmd(home.path())
        .args(["config", "use", "office"])
        .assert()
        .code(4);
}
