//! CLI integration tests

use std::process::{Command, Output};

fn cloudopt(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cloudopt"))
        .args(args)
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = cloudopt(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("cloud cost optimizer"), "Should show about text");
    for command in ["instances", "recommendations", "idle", "busy", "audit", "history", "usage", "export", "reseed"] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = cloudopt(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("cloudopt"), "Should show binary name");
}

#[test]
fn test_recommendations_help() {
    let output = cloudopt(&["recommendations", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--usage"), "Should show usage option");
    assert!(stdout.contains("--threshold"), "Should show threshold option");
    assert!(stdout.contains("--strict"), "Should show strict option");
}

#[test]
fn test_idle_help() {
    let output = cloudopt(&["idle", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--actor"), "Should show actor option");
}

#[test]
fn test_audit_help() {
    let output = cloudopt(&["audit", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--limit"), "Should show limit option");
    assert!(stdout.contains("--order"), "Should show order option");
}

#[test]
fn test_usage_add_help() {
    let output = cloudopt(&["usage", "add", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--provider"));
    assert!(stdout.contains("--resource-id"));
    assert!(stdout.contains("--cost"));
}

#[test]
fn test_export_rejects_unknown_kind() {
    let output = cloudopt(&["export", "invoices"]);

    assert!(!output.status.success(), "Unknown export kind should fail");
}

#[test]
fn test_idle_requires_numeric_id() {
    let output = cloudopt(&["idle", "dev-server"]);

    assert!(!output.status.success(), "Non-numeric id should fail");
}

/// Test invalid output format
#[test]
fn test_invalid_format() {
    let output = cloudopt(&["--format", "xml", "instances"]);

    assert!(!output.status.success(), "Invalid format should fail");
}

/// Unreachable server surfaces an error instead of a panic
#[test]
fn test_unreachable_server_fails_cleanly() {
    let output = Command::new(env!("CARGO_BIN_EXE_cloudopt"))
        .args(["--api-url", "http://127.0.0.1:1", "instances"])
        .env("HOME", std::env::temp_dir())
        .output()
        .expect("Failed to execute command");
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("Failed to send request"));
}
