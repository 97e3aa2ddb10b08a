//! CLI smoke tests that spawn the compiled `press` binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn press_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("press");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/press.sqlite"

[scrape]
output_dir = "{}/output"
"#,
        root.display(),
        root.display()
    );

    let config_path = config_dir.join("press.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_press(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = press_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run press binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_press(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data").join("press.sqlite").exists());
}

#[test]
fn init_is_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_press(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_press(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn stats_lists_all_partitions() {
    let (_tmp, config_path) = setup_test_env();

    run_press(&config_path, &["init"]);
    let (stdout, stderr, success) = run_press(&config_path, &["stats"]);
    assert!(success, "stats failed: stdout={}, stderr={}", stdout, stderr);
    for partition in [
        "original_content",
        "ai_generated",
        "reviews",
        "final_versions",
    ] {
        assert!(stdout.contains(partition), "missing {}: {}", partition, stdout);
    }
}

#[test]
fn search_on_empty_store_reports_no_results() {
    let (_tmp, config_path) = setup_test_env();

    run_press(&config_path, &["init"]);
    let (stdout, stderr, success) = run_press(&config_path, &["search", "anything"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("No results."));
}

#[test]
fn get_missing_record_exits_nonzero() {
    let (_tmp, config_path) = setup_test_env();

    run_press(&config_path, &["init"]);
    let (_, stderr, success) = run_press(&config_path, &["get", "original_content", "nope"]);
    assert!(!success);
    assert!(stderr.contains("No record"));
}

#[test]
fn delete_missing_record_exits_nonzero() {
    let (_tmp, config_path) = setup_test_env();

    run_press(&config_path, &["init"]);
    let (_, stderr, success) = run_press(&config_path, &["delete", "ai_generated", "nope"]);
    assert!(!success);
    assert!(stderr.contains("No record"));
}

#[test]
fn unknown_partition_is_rejected_at_the_boundary() {
    let (_tmp, config_path) = setup_test_env();

    run_press(&config_path, &["init"]);
    let (_, stderr, success) = run_press(&config_path, &["get", "chapters", "some-id"]);
    assert!(!success);
    assert!(
        stderr.contains("unknown partition"),
        "expected typed partition error, got: {}",
        stderr
    );
}

#[test]
fn history_missing_original_exits_nonzero() {
    let (_tmp, config_path) = setup_test_env();

    run_press(&config_path, &["init"]);
    let (_, stderr, success) = run_press(&config_path, &["history", "nope"]);
    assert!(!success);
    assert!(stderr.contains("No original"));
}
