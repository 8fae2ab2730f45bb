//! CLI integration tests.

use std::io::Write;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

fn crossarb() -> Command {
    let mut cmd = cargo_bin_cmd!("crossarb");
    cmd.env_remove("SLACK_WEBHOOK_URL").env_remove("RUST_LOG");
    cmd
}

fn sample(path: &str) -> String {
    format!("{}/{path}", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn test_help() {
    crossarb()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("crossarb"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn test_version() {
    crossarb()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_check_config_valid() {
    crossarb()
        .args(["check", "config", "-c", &sample("config.toml")])
        .assert()
        .success()
        .stdout(predicate::str::contains("005930"))
        .stdout(predicate::str::contains("5/s"))
        .stdout(predicate::str::contains("Configuration file is valid"));
}

#[test]
fn test_check_config_invalid_value() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[execution]\nclip_size = 0").unwrap();

    crossarb()
        .args(["check", "config", "-c"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("clip_size"));
}

#[test]
fn test_check_config_missing_file() {
    crossarb()
        .args(["check", "config", "-c", "/nonexistent/crossarb.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}

#[test]
fn test_webhook_from_environment() {
    crossarb()
        .env("SLACK_WEBHOOK_URL", "https://hooks.example.invalid/T000")
        .args(["check", "config", "-c", &sample("config.toml")])
        .assert()
        .success()
        .stdout(predicate::str::contains("webhook       configured"));
}

#[test]
fn test_run_replays_demo_feed() {
    crossarb()
        .args([
            "run",
            "-c",
            &sample("config.toml"),
            "-r",
            &sample("demos/replay.jsonl"),
            "--log-level",
            "warn",
        ])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("quotes        6"))
        .stdout(predicate::str::contains("sessions"));
}

#[test]
fn test_run_rejects_malformed_feed() {
    let mut feed = NamedTempFile::new().unwrap();
    writeln!(feed, "{{\"type\":\"session\",\"signal\":\"open\"}}\nnot json").unwrap();

    crossarb()
        .args(["run", "-c", &sample("config.toml"), "-r"])
        .arg(feed.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("replay line 2"));
}
