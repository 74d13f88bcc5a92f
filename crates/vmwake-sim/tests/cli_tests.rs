//! Integration tests for the vmwake-sim binary

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn vmwake_sim() -> Result<Command, assert_cmd::cargo::CargoError> {
    Command::cargo_bin("vmwake-sim")
}

#[test]
fn test_cli_help() -> TestResult {
    vmwake_sim()?
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("scheduling bridge"));
    Ok(())
}

#[test]
fn test_run_json_report() -> TestResult {
    let output = vmwake_sim()?
        .args(["run", "--json", "--delays", "4,8,8,12"])
        .output()?;
    assert!(output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["success"], Value::Bool(true));
    assert_eq!(report["report"]["threads_resumed"], Value::from(4));
    assert_eq!(report["report"]["counters"]["failures"], Value::from(0));
    Ok(())
}

#[test]
fn test_run_with_external_events() -> TestResult {
    vmwake_sim()?
        .args([
            "run",
            "--delays",
            "30",
            "--external-wake-interval-ms",
            "5",
            "--external-wakes",
            "2",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("External wakes:     2"));
    Ok(())
}

#[test]
fn test_zero_tick_rate_is_configuration_failure() -> TestResult {
    vmwake_sim()?
        .args(["run", "--tick-rate-hz", "0"])
        .assert()
        .failure()
        .code(4)
        .stderr(predicate::str::contains("tick rate"));
    Ok(())
}

#[test]
fn test_config_file_is_applied() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("sim.json");
    fs::write(
        &path,
        r#"{"tick_rate_hz": 250, "delays_ms": [6], "bridge": {"shutdown_policy": "release"}}"#,
    )?;

    let output = vmwake_sim()?
        .args(["config", "--config"])
        .arg(&path)
        .output()?;
    assert!(output.status.success());
    let config: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(config["tick_rate_hz"], Value::from(250));
    assert_eq!(config["bridge"]["shutdown_policy"], Value::from("release"));
    assert_eq!(config["bridge"]["initial_timer_delay_ms"], Value::from(100));
    Ok(())
}

#[test]
fn test_malformed_config_file() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ not json")?;

    vmwake_sim()?
        .args(["run", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .code(4);
    Ok(())
}
