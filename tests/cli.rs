//! Tests for the `tvault` binary that need no storage account.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn tvault_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("tvault");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("tvault.toml");
    fs::write(
        &config_path,
        r#"[storage]
container = "knowledge-base-direct"
connection_string_env = "TVAULT_TEST_CONNECTION_STRING_UNSET"

[aliases.sql]
"pro load" = "pro_load_calculation"
"перегрузка про" = "pro_load_calculation"
"#,
    )
    .unwrap();
    (tmp, config_path)
}

fn run_tvault(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = tvault_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("TVAULT_TEST_CONNECTION_STRING_UNSET")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run tvault binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_aliases_listed() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, stderr, success) = run_tvault(&config_path, &["aliases"]);
    assert!(success, "aliases failed: {}", stderr);
    assert!(stdout.contains("[sql]"));
    assert!(stdout.contains("pro load"));
    assert!(stdout.contains("перегрузка про"));
    assert!(stdout.contains("pro_load_calculation"));
}

#[test]
fn test_missing_connection_string_is_reported() {
    let (_tmp, config_path) = setup_test_env();
    let (_stdout, stderr, success) = run_tvault(&config_path, &["list"]);
    assert!(!success);
    assert!(stderr.contains("TVAULT_TEST_CONNECTION_STRING_UNSET"));
}

#[test]
fn test_missing_config_file() {
    let tmp = TempDir::new().unwrap();
    let (_stdout, stderr, success) = run_tvault(&tmp.path().join("nope.toml"), &["aliases"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
