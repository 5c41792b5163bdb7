//! E2E CLI tests: upload → search → list → show → delete → rebuild.
//!
//! Each test runs the `quarry` binary as a subprocess against a database in
//! an isolated temp directory, using the offline hashing embedder.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

/// Build a Command targeting the quarry binary with its state rooted in `dir`.
fn quarry_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("quarry"));
    cmd.current_dir(dir);
    cmd.env("QUARRY_DB", dir.join("quarry.db"));
    cmd.env("QUARRY_EMBEDDING_PROVIDER", "hashing");
    cmd.env("XDG_CONFIG_HOME", dir.join("config"));
    cmd.env_remove("FORMAT");
    // Suppress tracing output that goes to stderr
    cmd.env("QUARRY_LOG", "error");
    cmd
}

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write fixture");
    path
}

/// Run a command with `--json`, assert success, parse stdout.
fn json_ok(dir: &Path, args: &[&str]) -> Value {
    let output = quarry_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("quarry should not crash");
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be valid JSON")
}

/// Run a command with `--json`, assert it exits with `code`, parse stderr.
fn json_err(dir: &Path, args: &[&str], code: i32) -> Value {
    let output = quarry_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("quarry should not crash");
    assert_eq!(
        output.status.code(),
        Some(code),
        "{args:?} stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stderr).expect("stderr should be valid JSON")
}

fn upload(dir: &Path, name: &str, content: &str) -> i64 {
    let path = write_file(dir, name, content);
    let receipt = json_ok(dir, &["upload", path.to_str().expect("utf-8 path")]);
    receipt["file_id"].as_i64().expect("file_id is an integer")
}

fn seed(dir: &Path) -> (i64, i64, i64) {
    (
        upload(
            dir,
            "ml.txt",
            "machine learning basics: supervised models and gradient descent",
        ),
        upload(dir, "press.txt", "a short history of the printing press"),
        upload(
            dir,
            "deep.txt",
            "deep learning extends machine learning with neural networks",
        ),
    )
}

fn result_titles(response: &Value) -> Vec<String> {
    response["results"]
        .as_array()
        .expect("results array")
        .iter()
        .map(|r| r["title"].as_str().expect("title").to_owned())
        .collect()
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

#[test]
fn upload_returns_receipt() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_file(dir.path(), "notes.txt", "  hello quarry  \n");

    let receipt = json_ok(dir.path(), &["upload", path.to_str().expect("path")]);
    assert_eq!(
        receipt["message"],
        "notes.txt uploaded and embedded successfully"
    );
    assert_eq!(receipt["filename"], "notes.txt");
    assert_eq!(receipt["content_length"], 17);
    let id = receipt["file_id"].as_i64().expect("id");
    assert!(id > 0);

    let doc = json_ok(dir.path(), &["show", &id.to_string()]);
    assert_eq!(doc["content"], "  hello quarry  \n");
}

#[test]
fn batch_upload_returns_every_receipt() {
    let dir = TempDir::new().expect("tempdir");
    let a = write_file(dir.path(), "a.txt", "first document");
    let b = write_file(dir.path(), "b.txt", "second document");

    let batch = json_ok(
        dir.path(),
        &["upload", a.to_str().expect("path"), b.to_str().expect("path")],
    );
    assert_eq!(batch["total"], 2);
    assert_eq!(batch["uploaded"][0]["filename"], "a.txt");
    assert_eq!(batch["uploaded"][1]["filename"], "b.txt");
}

#[test]
fn empty_file_is_client_error() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_file(dir.path(), "empty.txt", "   \n");

    let err = json_err(dir.path(), &["upload", path.to_str().expect("path")], 2);
    assert_eq!(err["error"]["error_code"], "E1004");
    assert_eq!(err["error"]["status"], 400);

    let listing = json_ok(dir.path(), &["list"]);
    assert_eq!(listing["total"], 0);
}

#[test]
fn batch_with_one_bad_file_stores_nothing() {
    let dir = TempDir::new().expect("tempdir");
    let good = write_file(dir.path(), "good.txt", "useful words");
    let bad = write_file(dir.path(), "bad.txt", "");

    let err = json_err(
        dir.path(),
        &["upload", good.to_str().expect("path"), bad.to_str().expect("path")],
        2,
    );
    assert_eq!(err["error"]["error_code"], "E1004");
    assert_eq!(json_ok(dir.path(), &["list"])["total"], 0);
}

#[test]
fn missing_file_is_client_error() {
    let dir = TempDir::new().expect("tempdir");
    let err = json_err(dir.path(), &["upload", "does-not-exist.txt"], 2);
    assert_eq!(err["error"]["error_code"], "E1001");
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[test]
fn keyword_search_finds_term() {
    let dir = TempDir::new().expect("tempdir");
    seed(dir.path());

    let response = json_ok(dir.path(), &["search", "machine", "--mode", "keyword"]);
    assert_eq!(response["query"], "machine");
    assert_eq!(response["mode"], "keyword");
    let titles = result_titles(&response);
    assert!(titles.contains(&"ml.txt".to_owned()));
    assert!(!titles.contains(&"press.txt".to_owned()));
    assert_eq!(response["total_results"], titles.len());

    for hit in response["results"].as_array().expect("results") {
        assert!(hit["scores"]["keyword"].as_f64().expect("keyword") > 0.0);
        assert_eq!(hit["scores"]["semantic"].as_f64(), Some(0.0));
        assert!(hit["id"].is_string());
        assert_eq!(hit["metadata"]["filename"], hit["title"]);
    }
}

#[test]
fn keyword_search_for_absent_term_is_empty() {
    let dir = TempDir::new().expect("tempdir");
    seed(dir.path());

    let response = json_ok(dir.path(), &["search", "quantum", "--mode", "keyword"]);
    assert_eq!(response["total_results"], 0);
    assert_eq!(response["results"], Value::Array(vec![]));
}

#[test]
fn hybrid_is_the_default_mode() {
    let dir = TempDir::new().expect("tempdir");
    seed(dir.path());

    let response = json_ok(dir.path(), &["search", "machine learning"]);
    assert_eq!(response["mode"], "hybrid");
    for hit in response["results"].as_array().expect("results") {
        let kw = hit["scores"]["keyword"].as_f64().expect("keyword");
        let sem = hit["scores"]["semantic"].as_f64().expect("semantic");
        let hybrid = hit["scores"]["hybrid"].as_f64().expect("hybrid");
        assert!((hybrid - (0.5 * kw + 0.5 * sem)).abs() < 1e-9);
    }
}

#[test]
fn limit_flag_caps_results() {
    let dir = TempDir::new().expect("tempdir");
    seed(dir.path());

    let response = json_ok(dir.path(), &["search", "learning", "--mode", "semantic", "-n", "1"]);
    assert_eq!(response["total_results"], 1);
}

#[test]
fn invalid_mode_is_client_error() {
    let dir = TempDir::new().expect("tempdir");
    let err = json_err(dir.path(), &["search", "machine", "--mode", "fuzzy"], 2);
    assert_eq!(err["error"]["error_code"], "E1006");
    assert!(err["error"]["suggestion"].is_string());
}

#[test]
fn empty_query_is_client_error() {
    let dir = TempDir::new().expect("tempdir");
    let err = json_err(dir.path(), &["search", "   "], 2);
    assert_eq!(err["error"]["error_code"], "E1005");
}

// ---------------------------------------------------------------------------
// List / show / delete
// ---------------------------------------------------------------------------

#[test]
fn list_is_newest_first() {
    let dir = TempDir::new().expect("tempdir");
    let (ml, press, deep) = seed(dir.path());

    let listing = json_ok(dir.path(), &["list"]);
    assert_eq!(listing["total"], 3);
    let ids: Vec<String> = listing["attachments"]
        .as_array()
        .expect("attachments")
        .iter()
        .map(|a| a["id"].as_str().expect("id").to_owned())
        .collect();
    assert_eq!(ids, vec![deep.to_string(), press.to_string(), ml.to_string()]);
    assert_eq!(listing["attachments"][0]["has_embedding"], true);

    let limited = json_ok(dir.path(), &["list", "-n", "2"]);
    assert_eq!(limited["total"], 2);
}

#[test]
fn show_returns_full_content() {
    let dir = TempDir::new().expect("tempdir");
    let id = upload(dir.path(), "cafe.txt", "naïve café");

    let doc = json_ok(dir.path(), &["show", &id.to_string()]);
    assert_eq!(doc["id"], id.to_string());
    assert_eq!(doc["filename"], "cafe.txt");
    assert_eq!(doc["content"], "naïve café");
    assert_eq!(doc["content_length"], 10);
    assert_eq!(doc["has_embedding"], true);
}

#[test]
fn delete_removes_document_everywhere() {
    let dir = TempDir::new().expect("tempdir");
    let (ml, _, _) = seed(dir.path());

    let receipt = json_ok(dir.path(), &["delete", &ml.to_string()]);
    assert_eq!(
        receipt["message"],
        format!("Attachment {ml} deleted successfully")
    );

    for mode in ["keyword", "semantic", "hybrid"] {
        let response = json_ok(dir.path(), &["search", "machine", "--mode", mode]);
        assert!(!result_titles(&response).contains(&"ml.txt".to_owned()), "{mode}");
    }

    let err = json_err(dir.path(), &["show", &ml.to_string()], 3);
    assert_eq!(err["error"]["error_code"], "E2001");
    let err = json_err(dir.path(), &["delete", &ml.to_string()], 3);
    assert_eq!(err["error"]["status"], 404);
}

// ---------------------------------------------------------------------------
// Maintenance and output modes
// ---------------------------------------------------------------------------

#[test]
fn rebuild_reports_in_sync() {
    let dir = TempDir::new().expect("tempdir");
    seed(dir.path());

    let report = json_ok(dir.path(), &["rebuild"]);
    assert_eq!(report["documents"], 3);
    assert_eq!(report["in_sync"], true);

    let response = json_ok(dir.path(), &["search", "printing", "--mode", "keyword"]);
    assert_eq!(result_titles(&response), vec!["press.txt".to_owned()]);
}

#[test]
fn db_flag_overrides_environment() {
    let dir = TempDir::new().expect("tempdir");
    let other = dir.path().join("other.db");
    let path = write_file(dir.path(), "x.txt", "isolated");

    quarry_cmd(dir.path())
        .args(["--db", other.to_str().expect("path"), "upload"])
        .arg(&path)
        .arg("--json")
        .assert()
        .success();

    assert!(other.exists());
    assert_eq!(json_ok(dir.path(), &["list"])["total"], 0);
}

#[test]
fn text_output_is_plain_rows() {
    let dir = TempDir::new().expect("tempdir");
    let (ml, _, _) = seed(dir.path());

    quarry_cmd(dir.path())
        .args(["search", "machine", "--mode", "keyword", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("{ml}  ")))
        .stdout(predicate::str::contains("ml.txt"));
}

#[test]
fn human_errors_render_suggestion() {
    let dir = TempDir::new().expect("tempdir");
    quarry_cmd(dir.path())
        .args(["show", "999", "--format", "pretty"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("error: document 999 not found"))
        .stderr(predicate::str::contains("suggestion:"));
}
