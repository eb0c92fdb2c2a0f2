use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn sightings_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_sightings"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/sightings.sqlite"

[index]
path = "{root}/data/sightings-index.sqlite"

[pagination]
default_size = 2
max_size = 10

[server]
bind = "127.0.0.1:7431"

[logging]
level = "warn"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("sightings.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_sightings(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = sightings_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run sightings binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn sample(notes: &str) -> Value {
    json!({
        "subjectId": 0,
        "observerId": 0,
        "occurredAt": "1970-01-01T00:00:00Z",
        "latitude": 1.0,
        "longitude": 1.0,
        "count": 0,
        "heading": "STATIONARY",
        "notes": notes
    })
}

/// Create a record through the CLI and return the stored JSON.
fn create(config_path: &Path, body: &Value) -> Value {
    let (stdout, stderr, success) = run_sightings(config_path, &["create", &body.to_string()]);
    assert!(success, "create failed: stdout={}, stderr={}", stdout, stderr);
    serde_json::from_str(&stdout).unwrap()
}

#[test]
fn test_init_creates_databases() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_sightings(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/sightings.sqlite").exists());
    assert!(tmp.path().join("data/sightings-index.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_sightings(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_sightings(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_create_get_delete_round_trip() {
    let (_tmp, config_path) = setup_test_env();
    run_sightings(&config_path, &["init"]);

    let created = create(&config_path, &sample("AAAAAAAAAA"));
    let id = created["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());

    let (stdout, _, success) = run_sightings(&config_path, &["get", &id]);
    assert!(success);
    let fetched: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(fetched, created);
    assert_eq!(fetched["heading"], "STATIONARY");
    assert_eq!(fetched["notes"], "AAAAAAAAAA");

    let (stdout, _, success) = run_sightings(&config_path, &["delete", &id]);
    assert!(success);
    assert!(stdout.contains("Deleted"));

    let (_, stderr, success) = run_sightings(&config_path, &["get", &id]);
    assert!(!success, "get after delete should fail");
    assert!(stderr.contains("not found"), "stderr: {}", stderr);

    let (stdout, _, success) = run_sightings(&config_path, &["search", "AAAAAAAAAA"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_create_with_id_is_rejected() {
    let (_tmp, config_path) = setup_test_env();
    run_sightings(&config_path, &["init"]);

    let mut body = sample("x");
    body["id"] = json!("preset");
    let (_, stderr, success) = run_sightings(&config_path, &["create", &body.to_string()]);
    assert!(!success);
    assert!(stderr.contains("already have an ID"), "stderr: {}", stderr);

    let (stdout, _, _) = run_sightings(&config_path, &["list"]);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_create_rejects_invalid_payload() {
    let (_tmp, config_path) = setup_test_env();
    run_sightings(&config_path, &["init"]);

    let mut body = sample("x");
    body["heading"] = json!("UPWARD");
    let (_, stderr, success) = run_sightings(&config_path, &["create", &body.to_string()]);
    assert!(!success);
    assert!(stderr.contains("validation error"), "stderr: {}", stderr);

    let (_, _, success) = run_sightings(&config_path, &["create", "{not json"]);
    assert!(!success);
}

#[test]
fn test_update_replaces_and_reindexes() {
    let (_tmp, config_path) = setup_test_env();
    run_sightings(&config_path, &["init"]);

    let mut record = create(&config_path, &sample("plain"));
    record["notes"] = json!("pterodactyl overhead");
    record["heading"] = json!("NE");

    let (stdout, stderr, success) =
        run_sightings(&config_path, &["update", &record.to_string()]);
    assert!(success, "update failed: stdout={}, stderr={}", stdout, stderr);
    let updated: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(updated["heading"], "NORTHEAST");

    let (stdout, _, _) = run_sightings(&config_path, &["search", "notes:pterodactyl"]);
    assert!(stdout.contains(record["id"].as_str().unwrap()), "got: {}", stdout);

    let (stdout, _, _) = run_sightings(&config_path, &["search", "plain"]);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_update_without_id_is_rejected() {
    let (_tmp, config_path) = setup_test_env();
    run_sightings(&config_path, &["init"]);

    let (_, stderr, success) =
        run_sightings(&config_path, &["update", &sample("x").to_string()]);
    assert!(!success);
    assert!(stderr.contains("must carry its ID"), "stderr: {}", stderr);
}

#[test]
fn test_list_paginates_with_default_size() {
    let (_tmp, config_path) = setup_test_env();
    run_sightings(&config_path, &["init"]);

    for notes in ["one", "two", "three"] {
        create(&config_path, &sample(notes));
    }

    let (stdout, _, success) = run_sightings(&config_path, &["list"]);
    assert!(success);
    assert!(stdout.contains("Page 1 of 2 (3 total)"), "got: {}", stdout);

    let (stdout, _, _) = run_sightings(&config_path, &["list", "--page", "1"]);
    assert!(stdout.contains("3. "), "got: {}", stdout);
    assert!(stdout.contains("Page 2 of 2 (3 total)"));
}

#[test]
fn test_list_page_far_past_the_end() {
    let (_tmp, config_path) = setup_test_env();
    run_sightings(&config_path, &["init"]);
    create(&config_path, &sample("only"));

    let (stdout, stderr, success) = run_sightings(&config_path, &["list", "--page", "4294967295"]);
    assert!(success, "list failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("No results."), "got: {}", stdout);
    assert!(stdout.contains("Page 4294967296 of 1 (1 total)"), "got: {}", stdout);
}

#[test]
fn test_list_rejects_unknown_sort_field() {
    let (_tmp, config_path) = setup_test_env();
    run_sightings(&config_path, &["init"]);

    let (_, stderr, success) = run_sightings(&config_path, &["list", "--sort", "weight,desc"]);
    assert!(!success);
    assert!(stderr.contains("invalid sort"), "stderr: {}", stderr);
}

#[test]
fn test_search_deterministic() {
    let (_tmp, config_path) = setup_test_env();
    run_sightings(&config_path, &["init"]);

    for notes in ["lizard by the lake", "two lizard tracks", "lizard"] {
        create(&config_path, &sample(notes));
    }

    let (stdout1, _, _) = run_sightings(&config_path, &["search", "lizard", "--size", "10"]);
    let (stdout2, _, _) = run_sightings(&config_path, &["search", "lizard", "--size", "10"]);
    assert_eq!(stdout1, stdout2, "Search results should be deterministic");
    assert!(stdout1.contains("(3 total)"));
}

#[test]
fn test_search_match_all_and_syntax_error() {
    let (_tmp, config_path) = setup_test_env();
    run_sightings(&config_path, &["init"]);
    create(&config_path, &sample("anything"));

    let (stdout, _, success) = run_sightings(&config_path, &["search", "*"]);
    assert!(success);
    assert!(stdout.contains("(1 total)"));

    let (_, stderr, success) = run_sightings(&config_path, &["search", "notes:("]);
    assert!(!success);
    assert!(stderr.contains("query syntax error"), "stderr: {}", stderr);

    let (_, stderr, success) = run_sightings(&config_path, &["search", "   "]);
    assert!(!success);
    assert!(stderr.contains("must not be empty"), "stderr: {}", stderr);
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_sightings(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
