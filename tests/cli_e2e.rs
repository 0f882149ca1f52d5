//! End-to-end CLI tests for the harvester binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let mut cmd = Command::cargo_bin("harvester").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Discover and retrieve content items"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    let mut cmd = Command::cargo_bin("harvester").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("harvester"));
}

/// Test that invoking without the required arguments fails with usage help.
#[test]
fn test_binary_missing_required_args_returns_error() {
    let mut cmd = Command::cargo_bin("harvester").unwrap();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    let mut cmd = Command::cargo_bin("harvester").unwrap();
    cmd.arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

/// Test that a template without an {id} placeholder is rejected up front.
#[test]
fn test_binary_rejects_template_without_id_placeholder() {
    let mut cmd = Command::cargo_bin("harvester").unwrap();
    cmd.args([
        "-d",
        "01-01-2026",
        "-t",
        "https://e.test/view/{date}/{page}",
        "--start",
        "1000",
        "--end",
        "1010",
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("{id}"));
}

/// Test that an inverted identifier range is rejected up front.
#[test]
fn test_binary_rejects_inverted_range() {
    let mut cmd = Command::cargo_bin("harvester").unwrap();
    cmd.args([
        "-d",
        "01-01-2026",
        "-t",
        "https://e.test/view/{id}",
        "--start",
        "1010",
        "--end",
        "1000",
    ])
    .assert()
    .failure();
}

/// Full smoke run against a mock origin: one valid identifier in the range,
/// assets and ledger documents land in the output directory.
#[tokio::test(flavor = "multi_thread")]
async fn test_binary_smoke_run_harvests_and_persists() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let html = r#"<html><body>
        <div class="article_title">Item</div>
        <img id="current_artical" src="/assets/1005.jpeg">
    </body></html>"#;
    Mock::given(method("GET"))
        .and(path("/view/01-01-2026/1/1005"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/assets/1005.jpeg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"image".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html><body>no item</body></html>"),
        )
        .mount(&server)
        .await;

    let template = format!("{}/view/{{date}}/{{page}}/{{id}}", server.uri());
    let output = dir.path().to_path_buf();

    // assert_cmd blocks, so run it off the async runtime
    tokio::task::spawn_blocking(move || {
        let mut cmd = Command::cargo_bin("harvester").unwrap();
        cmd.args([
            "-d",
            "01-01-2026",
            "-t",
            &template,
            "--start",
            "1000",
            "--end",
            "1010",
            "--initial-step",
            "5",
            "--rate-limit",
            "0",
            "--no-progress",
            "-q",
        ])
        .arg("--output")
        .arg(&output)
        .assert()
        .success();
    })
    .await
    .unwrap();

    let context_dir = dir.path().join("01-01-2026");
    assert!(context_dir.join("page1_article_1005.jpeg").exists());
    assert!(context_dir.join("scraping_log.json").exists());
    assert!(context_dir.join("article_metadata.json").exists());

    let raw = std::fs::read_to_string(context_dir.join("scraping_log.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["stats"]["total_downloaded"], 1);
}
