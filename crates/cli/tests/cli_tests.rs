//! CLI integration tests

use std::process::{Command, Output};

fn reliably(args: &[&str]) -> Output {
    let mut full = vec!["run", "-q", "-p", "reliably-cli", "--"];
    full.extend_from_slice(args);
    Command::new("cargo")
        .args(&full)
        .env_remove("RELIABLY_ORG")
        .env_remove("RELIABLY_TOKEN")
        .env("HOME", std::env::temp_dir())
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = reliably(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Reliably CLI"), "Should show app name");
    assert!(stdout.contains("slo"), "Should show slo command");
    assert!(stdout.contains("--host"), "Should show host option");
    assert!(stdout.contains("--org"), "Should show org option");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = reliably(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("reliably"), "Should show binary name");
}

/// Test slo subcommand help lists every subcommand
#[test]
fn test_slo_help() {
    let output = reliably(&["slo", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "slo help should succeed");
    for command in ["init", "sync", "agent", "report", "related"] {
        assert!(stdout.contains(command), "Should show {command} command");
    }
}

/// Test report subcommand help
#[test]
fn test_report_help() {
    let output = reliably(&["slo", "report", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "report help should succeed");
    assert!(stdout.contains("--format"), "Should show format option");
    assert!(stdout.contains("--output"), "Should show output option");
    assert!(stdout.contains("--selector"), "Should show selector option");
    assert!(stdout.contains("--template"), "Should show template option");
    assert!(stdout.contains("--watch"), "Should show watch option");
    assert!(stdout.contains("reliably slo report -f yaml,json"), "Should show examples");
}

/// Test agent subcommand help
#[test]
fn test_agent_help() {
    let output = reliably(&["slo", "agent", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "agent help should succeed");
    assert!(stdout.contains("--manifest"), "Should show manifest option");
    assert!(stdout.contains("--interval"), "Should show interval option");
    assert!(stdout.contains("300"), "Should show default interval");
    assert!(stdout.contains("--selector"), "Should show selector option");
    assert!(stdout.contains("--report-view"), "Should show report view option");
}

/// Test related subcommand help
#[test]
fn test_related_help() {
    let output = reliably(&["slo", "related", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "related help should succeed");
    assert!(stdout.contains("--filter"), "Should show filter option");
    assert!(stdout.contains("--refresh"), "Should show refresh option");
    assert!(stdout.contains("--offline"), "Should show offline option");
}

/// Test invalid command
#[test]
fn test_invalid_command() {
    let output = reliably(&["slo", "invalid-command"]);
    assert!(!output.status.success(), "Invalid command should fail");
}

/// Test that several formats without outputs are rejected
#[test]
fn test_report_rejects_formats_without_outputs() {
    let output = reliably(&["--org", "acme", "slo", "report", "-f", "yaml,json"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Mismatched outputs should fail");
    assert!(
        stderr.contains("Multiple output formats"),
        "Should explain the output pairing: {stderr}"
    );
}

/// Test that an unknown format is rejected
#[test]
fn test_report_rejects_unknown_format() {
    let output = reliably(&["--org", "acme", "slo", "report", "-f", "html"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Unknown format should fail");
    assert!(stderr.contains("Format 'html' is not valid"));
}

/// Test that a malformed selector is rejected
#[test]
fn test_report_rejects_bad_selector() {
    let output = reliably(&["--org", "acme", "slo", "report", "-l", "service"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Bad selector should fail");
    assert!(stderr.contains("selector string incorrectly delimited"));
}

/// Test that a missing manifest fails before anything else
#[test]
fn test_sync_missing_manifest() {
    let output = reliably(&[
        "--org",
        "acme",
        "slo",
        "sync",
        "-m",
        "/nonexistent/reliably.yaml",
    ]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Missing manifest should fail");
    assert!(stderr.contains("failed to read manifest"));
}

/// Test that the agent needs an organization
#[test]
fn test_agent_requires_org() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("reliably.yaml");
    std::fs::write(
        &manifest,
        r#"apiVersion: reliably.com/v1
kind: Objective
metadata:
  labels:
    service: api
    name: availability
spec:
  indicatorSelector:
    category: availability
    aws_arn: arn:aws:apigateway:eu-west-1::/restapis/abc123/stages/prod
  objectivePercent: 99
  window: 1h
"#,
    )
    .unwrap();

    let output = reliably(&["slo", "agent", "-m", manifest.to_str().unwrap()]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Agent without org should fail");
    assert!(stderr.contains("no current organization"));
}

/// Test that the agent report view rejects a malformed selector
#[test]
fn test_agent_report_view_rejects_bad_selector() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("reliably.yaml");
    std::fs::write(
        &manifest,
        r#"apiVersion: reliably.com/v1
kind: Objective
metadata:
  labels:
    service: api
    name: availability
spec:
  indicatorSelector:
    category: availability
    aws_arn: arn:aws:apigateway:eu-west-1::/restapis/abc123/stages/prod
  objectivePercent: 99
  window: 1h
"#,
    )
    .unwrap();

    let output = reliably(&[
        "--org",
        "acme",
        "slo",
        "agent",
        "-R",
        "-l",
        "service",
        "-m",
        manifest.to_str().unwrap(),
    ]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Bad selector should fail");
    assert!(stderr.contains("selector string incorrectly delimited"));
}

/// Test offline relationship graph from a manifest
#[test]
fn test_related_offline() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("reliably.yaml");
    std::fs::write(
        &manifest,
        r#"apiVersion: reliably.com/v1
kind: Objective
metadata:
  labels:
    service: api
    name: availability
spec:
  indicatorSelector:
    category: availability
  objectivePercent: 99
  window: 1h
---
apiVersion: reliably.com/v1
kind: Objective
metadata:
  labels:
    service: web
    name: latency
  relatedTo:
    - service: api
spec:
  indicatorSelector:
    category: latency
    latency_target: 250ms
  objectivePercent: 95
  window: 1h
"#,
    )
    .unwrap();

    let output = reliably(&[
        "--org",
        "acme",
        "slo",
        "related",
        "--offline",
        "-m",
        manifest.to_str().unwrap(),
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Offline graph should succeed");
    let graph: serde_json::Value = serde_json::from_str(&stdout).expect("graph JSON");
    assert_eq!(graph["nodes"].as_array().map(Vec::len), Some(2));
    assert_eq!(graph["edges"].as_array().map(Vec::len), Some(1));
}
