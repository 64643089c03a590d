//! CLI tests for the `rearguard` binary.
//!
//! Only paths that behave the same with or without root privileges are
//! exercised here; the full bootstrap is covered in `bootstrap_lifecycle`.

use std::process::Command;

use rearguard::exit_codes;

fn rearguard() -> Command {
    Command::new(env!("CARGO_BIN_EXE_rearguard"))
}

#[test]
fn no_workflow_prints_usage_and_succeeds() {
    let output = rearguard().output().expect("rearguard");

    assert_eq!(output.status.code(), Some(exit_codes::SUCCESS));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("Usage: rearguard"));
    assert!(stdout.contains("dump"));
}

#[test]
fn help_flag_overrides_workflow() {
    let output = rearguard()
        .args(["-h", "mkrescue"])
        .output()
        .expect("rearguard -h");

    assert_eq!(output.status.code(), Some(exit_codes::SUCCESS));
    assert!(String::from_utf8_lossy(&output.stdout).contains("List of commands:"));
}

#[test]
fn version_flag_prints_version() {
    let output = rearguard().arg("-V").output().expect("rearguard -V");

    assert_eq!(output.status.code(), Some(exit_codes::SUCCESS));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("rearguard {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn unknown_flag_is_a_usage_error() {
    let output = rearguard()
        .args(["--no-such-flag", "mkrescue"])
        .output()
        .expect("rearguard --no-such-flag");

    assert_eq!(output.status.code(), Some(exit_codes::FAILURE));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("--help").count(), 1, "{stderr}");
}

#[test]
fn option_value_that_looks_like_a_flag_is_rejected() {
    let output = rearguard()
        .args(["-c", "-v", "mkrescue"])
        .output()
        .expect("rearguard -c -v");

    assert_eq!(output.status.code(), Some(exit_codes::FAILURE));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("-c"));
    assert_eq!(stderr.matches("--help").count(), 1, "{stderr}");
}
