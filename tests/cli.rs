use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn shopsync(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("shopsync").unwrap();
    cmd.env("SHOPSYNC_HOME", home.path())
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("SHOPSYNC_CONFIG");
    cmd
}

/// Config pointing the API at a port nothing listens on.
fn offline_config(home: &TempDir) -> std::path::PathBuf {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let path = home.path().join("offline.yaml");
    std::fs::write(
        &path,
        format!("api:\n  base_url: http://127.0.0.1:{port}\n  timeout_secs: 1\n"),
    )
    .unwrap();
    path
}

fn queued_items(home: &TempDir) -> Vec<serde_json::Value> {
    let output = shopsync(home).args(["list", "-o", "json"]).output().unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    value["items"].as_array().unwrap().clone()
}

#[test]
fn test_status_on_empty_queue() {
    let home = TempDir::new().unwrap();

    shopsync(&home)
        .args(["status", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total\": 0"));
}

#[test]
fn test_enqueue_then_list_in_priority_order() {
    let home = TempDir::new().unwrap();

    shopsync(&home)
        .args([
            "enqueue",
            "report",
            "create",
            "--data",
            r#"{"title":"Weekly","body":{"jobs":4}}"#,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Queued create report"));

    shopsync(&home)
        .args([
            "enqueue",
            "device",
            "update",
            "--data",
            r#"{"id":"d-1","serial_number":"SN-1","model":"Pixel 7"}"#,
            "--priority",
            "high",
        ])
        .assert()
        .success();

    let items = queued_items(&home);
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["payload"]["kind"], "device");
    assert_eq!(items[0]["priority"], "high");
    assert_eq!(items[1]["payload"]["kind"], "report");
    assert_eq!(items[1]["priority"], "low");
}

#[test]
fn test_enqueue_rejects_bad_data() {
    let home = TempDir::new().unwrap();

    shopsync(&home)
        .args(["enqueue", "device", "delete", "--data", r#"{"serial_number":"SN","model":"M"}"#])
        .assert()
        .failure()
        .stderr(predicate::str::contains("requires the remote"));

    shopsync(&home)
        .args(["enqueue", "backup", "create", "--data", "not json"])
        .assert()
        .failure();

    assert!(queued_items(&home).is_empty());
}

#[test]
fn test_remove_operation() {
    let home = TempDir::new().unwrap();

    shopsync(&home)
        .args([
            "enqueue",
            "diagnostic",
            "create",
            "--data",
            r#"{"device_id":"d-2","summary":"Fan noise","results":{"fan":"loud"}}"#,
        ])
        .assert()
        .success();

    let id = queued_items(&home)[0]["id"].as_str().unwrap().to_string();

    shopsync(&home).args(["remove", &id]).assert().success();
    shopsync(&home).args(["remove", &id]).assert().failure();
    assert!(queued_items(&home).is_empty());
}

#[test]
fn test_run_while_offline_keeps_queue() {
    let home = TempDir::new().unwrap();
    let config = offline_config(&home);

    shopsync(&home)
        .args(["enqueue", "device", "create", "--data", r#"{"serial_number":"SN-9","model":"XPS 13"}"#])
        .assert()
        .success();

    shopsync(&home)
        .arg("--config")
        .arg(&config)
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped: offline"));

    assert_eq!(queued_items(&home).len(), 1);
}

#[test]
fn test_clear_failed_and_retry_on_clean_queue() {
    let home = TempDir::new().unwrap();

    shopsync(&home)
        .arg("clear-failed")
        .assert()
        .success()
        .stdout(predicate::str::contains("No failed operations to clear."));

    shopsync(&home)
        .args(["retry", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"reset\": 0"));
}

#[test]
fn test_file_backend_from_config() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("file.yaml");
    std::fs::write(&config, "queue:\n  storage: file\n").unwrap();

    shopsync(&home)
        .arg("--config")
        .arg(&config)
        .args(["enqueue", "report", "create", "--data", r#"{"title":"Q","body":null}"#])
        .assert()
        .success();

    assert!(home.path().join("store").join("shopsync.queue.json").exists());
}

#[test]
fn test_invalid_config_is_reported() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("bad.yaml");
    std::fs::write(&config, "queue:\n  max_attempts: 0\n").unwrap();

    shopsync(&home)
        .arg("--config")
        .arg(&config)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_attempts"));
}

#[test]
fn test_completions() {
    let home = TempDir::new().unwrap();

    shopsync(&home)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("shopsync"));
}
