//! Integration tests for imgcast-queue

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to escape path for TOML on Windows
fn escape_path_for_toml(path: &str) -> String {
    path.replace('\\', "\\\\")
}

/// Create a config file pointing at a scratch database
fn setup_test_env() -> (TempDir, String) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let db_path = temp_dir.path().join("data").join("schedule.db");

    let config_content = format!(
        r#"
[database]
path = "{}"

[scheduling]
request_timeout = 5
"#,
        escape_path_for_toml(&db_path.to_string_lossy())
    );
    fs::write(&config_path, config_content).unwrap();

    (temp_dir, config_path.to_string_lossy().to_string())
}

fn queue(config_path: &str) -> Command {
    let mut cmd = Command::cargo_bin("imgcast-queue").unwrap();
    cmd.env("IMGCAST_CONFIG", config_path)
        .env_remove("IMGCAST_DB_PATH")
        .env_remove("IMGCAST_POSTING_TOKEN");
    cmd
}

fn add_args<'a>(context: &'a str, at: &'a str) -> Vec<&'a str> {
    vec![
        "add",
        "--context",
        context,
        "--host",
        "https://mastodon.social",
        "--token",
        "1234567890",
        "--caption",
        "This is a test caption",
        "--image",
        "http://image.host/image.jpg",
        "--at",
        at,
    ]
}

fn list_json(config_path: &str) -> Vec<serde_json::Value> {
    let output = queue(config_path)
        .args(["list", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_add_then_list_json() {
    let (_temp_dir, config_path) = setup_test_env();

    let output = queue(&config_path)
        .args(add_args("mastodon", "2h"))
        .output()
        .unwrap();
    assert!(output.status.success());
    let id = String::from_utf8(output.stdout).unwrap().trim().to_string();

    let posts = list_json(&config_path);
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["id"], id.as_str());
    assert_eq!(posts[0]["context"], "mastodon");
    assert_eq!(posts[0]["imageURL"], "http://image.host/image.jpg");
    assert!(posts[0].get("postingToken").is_none());
}

#[test]
fn test_list_filters_by_context() {
    let (_temp_dir, config_path) = setup_test_env();

    queue(&config_path)
        .args(add_args("mastodon", "1h"))
        .assert()
        .success();
    queue(&config_path)
        .args(add_args("bluesky", "1h"))
        .assert()
        .success();

    queue(&config_path)
        .args(["list", "--context", "bluesky"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bluesky"))
        .stdout(predicate::str::contains("mastodon |").not());
}

#[test]
fn test_add_unknown_context_exit_code() {
    let (_temp_dir, config_path) = setup_test_env();

    queue(&config_path)
        .args(add_args("myspace", "1h"))
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Unknown context"));
}

#[test]
fn test_add_bad_time_exit_code() {
    let (_temp_dir, config_path) = setup_test_env();

    queue(&config_path)
        .args(add_args("mastodon", "whenever the mood strikes"))
        .assert()
        .failure()
        .code(3);
}

#[test]
fn test_list_invalid_format() {
    let (_temp_dir, config_path) = setup_test_env();

    queue(&config_path)
        .args(["list", "--format", "xml"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Invalid format"));
}

#[test]
fn test_handle_enqueue_event() {
    let (_temp_dir, config_path) = setup_test_env();

    let event = r#"{
        "context": "twitter",
        "postingHost": "https://maker.ifttt.com/trigger/post/with/key/abc",
        "caption": "Caption #tag",
        "imageURL": "http://image.host/image.jpg",
        "postingTime": "4102444800"
    }"#;

    let output = queue(&config_path)
        .arg("handle")
        .write_stdin(event)
        .output()
        .unwrap();
    assert!(output.status.success());

    let response: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(response["statusCode"], 200);
    let body: serde_json::Value =
        serde_json::from_str(response["body"].as_str().unwrap()).unwrap();

    let posts = list_json(&config_path);
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["id"], body["id"]);
    assert_eq!(posts[0]["postingTime"], 4_102_444_800_i64);
}

#[test]
fn test_handle_unknown_context() {
    let (_temp_dir, config_path) = setup_test_env();

    queue(&config_path)
        .arg("handle")
        .write_stdin(r#"{"context":"myspace"}"#)
        .assert()
        .code(1)
        .stdout(predicate::str::contains(r#""statusCode":404"#))
        .stdout(predicate::str::contains("unknown context"));
}

#[test]
fn test_handle_garbage_is_501() {
    let (_temp_dir, config_path) = setup_test_env();

    queue(&config_path)
        .arg("handle")
        .write_stdin("not json at all")
        .assert()
        .code(1)
        .stdout(predicate::str::contains(r#""statusCode":501"#))
        .stdout(predicate::str::contains("failed to run scheduler"));
}

#[test]
fn test_handle_sweep_empty_queue() {
    let (_temp_dir, config_path) = setup_test_env();

    let output = queue(&config_path)
        .arg("handle")
        .write_stdin(r#"{"body":"{\"context\":\"schedule\"}"}"#)
        .output()
        .unwrap();
    assert!(output.status.success());

    let response: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(response["statusCode"], 200);
    let body: serde_json::Value =
        serde_json::from_str(response["body"].as_str().unwrap()).unwrap();
    assert_eq!(
        body,
        serde_json::json!({ "successfulCount": 0, "failedCount": 0 })
    );
}

#[test]
fn test_handle_sweep_keeps_undeliverable_post() {
    let (_temp_dir, config_path) = setup_test_env();

    // Nothing listens on the discard port, so the relay call fails
    queue(&config_path)
        .args([
            "add",
            "--context",
            "instagram",
            "--host",
            "http://127.0.0.1:9/hook",
            "--caption",
            "Caption",
            "--image",
            "http://127.0.0.1:9/image.jpg",
            "--at",
            "1",
        ])
        .assert()
        .success();

    let output = queue(&config_path)
        .arg("handle")
        .write_stdin(r#"{"context":"schedule"}"#)
        .output()
        .unwrap();
    assert!(output.status.success());

    let response: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let body: serde_json::Value =
        serde_json::from_str(response["body"].as_str().unwrap()).unwrap();
    assert_eq!(body["successfulCount"], 0);
    assert_eq!(body["failedCount"], 1);

    assert_eq!(list_json(&config_path).len(), 1);
}
