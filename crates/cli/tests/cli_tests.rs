//! CLI integration tests

use std::fs;
use std::process::{Command, Output};
use tempfile::TempDir;

fn penv(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_penv"))
        .args(args)
        .env_remove("PENV_THRESHOLD_FILE")
        .env_remove("PENV_WORKLOAD_FILE")
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = penv(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("performance envelope"),
        "Should show app description"
    );
    assert!(stdout.contains("show"), "Should show show command");
    assert!(stdout.contains("tdp"), "Should show tdp command");
    assert!(stdout.contains("lc-util"), "Should show lc-util command");
    assert!(stdout.contains("set-lc-util"), "Should show set-lc-util command");
    assert!(stdout.contains("partition"), "Should show partition command");
    assert!(stdout.contains("workloads"), "Should show workloads command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = penv(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("penv"), "Should show binary name");
}

/// Test partition preview for a two-core workload
#[test]
fn test_partition_json() {
    let output = penv(&["--format", "json", "partition", "2"]);
    assert!(output.status.success(), "Partition should succeed");

    let bands: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let starts: Vec<f64> = bands
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["start"].as_f64().unwrap())
        .collect();
    assert_eq!(starts, vec![100.0, 150.0, 200.0, 250.0]);
}

/// Test that setting the ceiling persists it for later reads
#[test]
fn test_set_and_read_lc_util() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("threshold.json");
    let path_arg = path.to_str().unwrap();

    let output = penv(&["--thresholds", path_arg, "set-lc-util", "320"]);
    assert!(output.status.success(), "set-lc-util should succeed");
    assert!(path.exists());

    let output = penv(&["--thresholds", path_arg, "--format", "json", "lc-util"]);
    assert!(output.status.success(), "lc-util should succeed");
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["lcutilmax"].as_f64(), Some(320.0));
}

/// Test showing thresholds of a persisted model
#[test]
fn test_show_job_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("threshold.json");
    fs::write(
        &path,
        r#"{
  "lcutilmax": 250.0,
  "redis": {
    "tdp": {},
    "thresh": [
      {"util_start": 100.0, "util_end": 150.0, "cpi": 1.1, "mpki": 2.2, "mb": 330.0}
    ]
  }
}"#,
    )
    .unwrap();
    let path_arg = path.to_str().unwrap();

    let output = penv(&["--thresholds", path_arg, "--format", "json", "show", "redis"]);
    assert!(output.status.success(), "show should succeed");
    let bands: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(bands[0]["cpi"].as_f64(), Some(1.1));

    let output = penv(&["--thresholds", path_arg, "--format", "json", "tdp", "redis"]);
    assert!(output.status.success(), "tdp should succeed");
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "null");
}

/// Test that listing workloads requires a metadata file
#[test]
fn test_workloads_requires_file() {
    let output = penv(&["workloads"]);
    assert!(!output.status.success(), "workloads without a file should fail");
}
