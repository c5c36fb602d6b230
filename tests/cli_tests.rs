use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const AGREEMENT: &str = r#"<!DOCTYPE html>
<html><head><title>Lease</title></head><body>
<h1>Lease Agreement</h1>
<p><a name="T1">Rent is due on the first day of each month.</a></p>
<p><a id="T2">The deposit is returned within 30 days.</a></p>
</body></html>"#;

const COMMENTS: &str = r#"{
  "DocumentID": "lease-1",
  "Comments": [
    {"CommentID": "c1", "TextID": "T1", "CommentAuthor": "Alice", "CommentDateTime": "2025-03-01", "CommentText": "Why the first day?", "DocumentID": "lease-1"},
    {"CommentID": 2, "TextID": "T9", "CommentAuthor": "Bob", "CommentDateTime": "2025-03-02", "CommentText": "Missing clause", "DocumentID": "lease-1"},
    {"CommentID": "x", "TextID": "T1", "CommentAuthor": "Eve", "CommentDateTime": "2025-03-03", "CommentText": "Other document", "DocumentID": "other"}
  ]
}"#;

/// Helper to lay out a config, a comments file and an agreements directory.
fn setup_workspace() -> TempDir {
    let temp = tempfile::tempdir().unwrap();
    let agreements = temp.path().join("agreements");
    fs::create_dir(&agreements).unwrap();
    fs::write(agreements.join("lease-1.html"), AGREEMENT).unwrap();

    let comments = temp.path().join("comments.json");
    fs::write(&comments, COMMENTS).unwrap();

    let config = format!(
        "comments_url = {:?}\nagreements_dir = {:?}\nlog_file = {:?}\n",
        comments.display().to_string(),
        agreements.display().to_string(),
        temp.path().join("portal.log").display().to_string(),
    );
    fs::write(temp.path().join("config.toml"), config).unwrap();
    temp
}

fn portal_cmd(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("review-portal").unwrap();
    cmd.arg("--config")
        .arg(config)
        .env_remove("REVIEW_PORTAL_COMMENTS_URL")
        .env_remove("REVIEW_PORTAL_SUBMIT_URL")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn missing_document_id_halts() {
    let temp = setup_workspace();
    portal_cmd(&temp.path().join("config.toml"))
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "No DocumentID provided. Example: --document-id mydoc-1234",
        ));
}

#[test]
fn invalid_document_id_rejected() {
    let temp = setup_workspace();
    portal_cmd(&temp.path().join("config.toml"))
        .args(["status", "--document-id", "../etc/passwd"])
        .assert()
        .failure();
}

#[test]
fn status_lists_comments_for_document() {
    let temp = setup_workspace();
    portal_cmd(&temp.path().join("config.toml"))
        .args(["status", "--document-id", "lease-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Review Status for lease-1"))
        .stdout(predicate::str::contains("c1"))
        .stdout(predicate::str::contains("Alice"))
        .stdout(predicate::str::contains("✓ T1"))
        .stdout(predicate::str::contains("✗ T9"))
        .stdout(predicate::str::contains("Eve").not())
        .stdout(predicate::str::contains("Comments:   2"))
        .stdout(predicate::str::contains("Passages:   1/2 found in document"));
}

#[test]
fn status_accepts_portal_link() {
    let temp = setup_workspace();
    portal_cmd(&temp.path().join("config.toml"))
        .args([
            "status",
            "--url",
            "https://portal.example.com/review?documentId=lease-1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Review Status for lease-1"));
}

#[test]
fn status_fails_when_comments_unavailable() {
    let temp = setup_workspace();
    fs::remove_file(temp.path().join("comments.json")).unwrap();
    portal_cmd(&temp.path().join("config.toml"))
        .args(["status", "--document-id", "lease-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to fetch comments for lease-1"));
}

#[test]
fn anchors_lists_reference_keys() {
    let temp = setup_workspace();
    portal_cmd(&temp.path().join("config.toml"))
        .args(["anchors", "--document-id", "lease-1"])
        .assert()
        .success()
        .stdout(predicate::eq("T1\nT2\n"));
}

#[test]
fn anchors_fails_for_unknown_document() {
    let temp = setup_workspace();
    portal_cmd(&temp.path().join("config.toml"))
        .args(["anchors", "--document-id", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("document not found"));
}

#[test]
fn status_requires_comments_endpoint() {
    let temp = setup_workspace();
    let config = temp.path().join("bare.toml");
    fs::write(&config, "agreements_dir = \"agreements\"\n").unwrap();
    portal_cmd(&config)
        .args(["status", "--document-id", "lease-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no comments endpoint configured"));
}
