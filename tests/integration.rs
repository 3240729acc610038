use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Every vendor endpoint points at a closed port so research falls back
    // to synthetic data without touching the network.
    let config_content = format!(
        r#"[db]
path = "{}/data/kscout.sqlite"

[server]
bind = "127.0.0.1:7331"

[sources]
timeout_secs = 1
autocomplete_timeout_secs = 1
openapi_url = "http://127.0.0.1:9"
autocomplete_url = "http://127.0.0.1:9/ac"
search_url = "http://127.0.0.1:9/search"
"#,
        root.display()
    );

    let config_path = config_dir.join("kscout.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_kscout(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_kscout"))
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("NAVER_CLIENT_ID")
        .env_remove("NAVER_CLIENT_SECRET")
        .env_remove("NAVER_CUSTOMER_ID")
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to run kscout binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn run_json(config_path: &Path, args: &[&str]) -> Value {
    let (stdout, stderr, success) = run_kscout(config_path, args);
    assert!(success, "{:?} failed: stdout={}, stderr={}", args, stdout, stderr);
    serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("bad JSON from {:?}: {} ({})", args, e, stdout))
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_kscout(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/kscout.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, first) = run_kscout(&config_path, &["init"]);
    assert!(first, "First init failed");
    let (_, _, second) = run_kscout(&config_path, &["init"]);
    assert!(second, "Second init failed (not idempotent)");
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_kscout(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_research_without_credentials_uses_fallback() {
    let (_tmp, config_path) = setup_test_env();
    run_kscout(&config_path, &["init"]);

    let report = run_json(&config_path, &["research", "Rust  Web"]);
    assert_eq!(report["keyword"], "rust web");
    assert_eq!(report["metrics"]["source"], "fallback");
    assert_eq!(report["metrics"]["freshness"], "fresh");
    assert_eq!(report["trends"]["source"], "fallback");
    assert_eq!(report["trends"]["data"].as_array().unwrap().len(), 12);
    assert_eq!(report["relatedTerms"]["terms"], Value::Array(vec![]));
    assert_eq!(report["relatedTerms"]["freshness"], "processing");
    assert_eq!(report["tagSuggestions"]["source"], "keyword-analysis");

    // Second run replays the cached report.
    let again = run_json(&config_path, &["research", "rust web"]);
    assert_eq!(again["timestamp"], report["timestamp"]);
    assert_eq!(again["metrics"]["source"], "fallback");
    assert_eq!(again["tagSuggestions"]["source"], "cache");
}

#[test]
fn test_show_history_and_clear() {
    let (_tmp, config_path) = setup_test_env();
    run_kscout(&config_path, &["init"]);
    run_json(&config_path, &["research", "tokio"]);

    let metrics = run_json(&config_path, &["show", "metrics", "tokio"]);
    assert_eq!(metrics["keyword"], "tokio");
    assert!(metrics["searchVolume"].as_i64().unwrap() >= 10);

    let related = run_json(&config_path, &["show", "related", "tokio"]);
    assert_eq!(related, Value::Null);

    let history = run_json(&config_path, &["history"]);
    assert_eq!(history[0]["keyword"], "tokio");
    assert_eq!(history[0]["searchCount"], 1);

    let cleared = run_json(&config_path, &["clear", "--cache-only"]);
    assert_eq!(cleared["removed"], 1);

    let cleared = run_json(&config_path, &["clear", "--keyword", "tokio"]);
    assert_eq!(cleared["removed"], 1);
    let history = run_json(&config_path, &["history"]);
    assert_eq!(history, Value::Array(vec![]));
}

#[test]
fn test_bulk_rejects_out_of_range_count() {
    let (_tmp, config_path) = setup_test_env();
    run_kscout(&config_path, &["init"]);

    let (_, stderr, success) = run_kscout(&config_path, &["bulk", "rust", "--count", "0"]);
    assert!(!success);
    assert!(stderr.contains("searchCount"));

    let response = run_json(&config_path, &["bulk", "rust", "--count", "5"]);
    // No related terms without autocomplete, so only the seed is searched.
    assert_eq!(response["totalSearched"], 1);
    assert_eq!(response["skippedDuplicates"], 0);
}

#[test]
fn test_credentials_status() {
    let (_tmp, config_path) = setup_test_env();
    run_kscout(&config_path, &["init"]);

    let status = run_json(&config_path, &["credentials", "status"]);
    assert_eq!(status["isConfigured"], false);
    let check = run_json(&config_path, &["credentials", "test"]);
    assert_eq!(check["isValid"], false);
}
