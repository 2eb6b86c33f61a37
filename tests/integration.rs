//! End-to-end tests that drive the compiled `insightd` binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn insightd_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("insightd");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // No sources, analysis disabled, no delivery channels: the pipeline
    // must still run cleanly end to end.
    let config_content = format!(
        r#"[storage]
path = "{}/data/insight.db"

[retry]
max_attempts = 2
backoff_base_secs = 1
"#,
        root.display()
    );

    let config_path = config_dir.join("insightd.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_insightd(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = insightd_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run insightd binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_insightd(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_insightd(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_insightd(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_run_with_empty_config_exits_zero() {
    let (_tmp, config_path) = setup_test_env();

    run_insightd(&config_path, &["init"]);
    let (stdout, stderr, success) = run_insightd(&config_path, &["run"]);
    assert!(success, "run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("run"));
    assert!(stdout.contains("no sources configured"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_articles_on_empty_store() {
    let (_tmp, config_path) = setup_test_env();

    run_insightd(&config_path, &["init"]);
    let (stdout, _, success) = run_insightd(&config_path, &["articles"]);
    assert!(success);
    assert!(stdout.contains("no records stored"));
}

#[test]
fn test_sources_lists_known_adapters() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_insightd(&config_path, &["sources"]);
    assert!(success);
    assert!(stdout.contains("arxiv"));
    assert!(stdout.contains("hackernews"));
    assert!(stdout.contains("NOT CONFIGURED"));
}

#[test]
fn test_analyze_refuses_when_disabled() {
    let (_tmp, config_path) = setup_test_env();

    run_insightd(&config_path, &["init"]);
    let (_, stderr, success) = run_insightd(&config_path, &["analyze"]);
    assert!(!success);
    assert!(stderr.contains("disabled"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (tmp, _) = setup_test_env();
    let bad_config = tmp.path().join("config").join("bad.toml");
    fs::write(
        &bad_config,
        "[storage]\npath = \"x.db\"\n\n[analysis]\nprovider = \"oracle\"\n",
    )
    .unwrap();

    let (_, stderr, success) = run_insightd(&bad_config, &["sources"]);
    assert!(!success);
    assert!(stderr.contains("Unknown analysis provider"));
}
