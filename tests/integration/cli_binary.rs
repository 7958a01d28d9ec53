//! Integration tests that drive the `broker-migrate` binary

use super::test_utils::{binding, instance};
use broker_store_migrator::store::{RecordSink, Retirement, SqlStore};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn broker_migrate() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_broker-migrate"));
    command.env_clear();
    command
}

fn run_against(db_path: &Path, url: &str, extra: &[&str]) -> Output {
    broker_migrate()
        .arg("--db-path")
        .arg(db_path)
        .args(["--secret-store-url", url])
        .args(["--uaa-client-id", "broker-client"])
        .args(["--uaa-client-secret", "s3cret"])
        .args(["--store-id", "broker-1"])
        .args(extra)
        .output()
        .unwrap()
}

fn seeded_database(temp_dir: &TempDir) -> PathBuf {
    let db_path = temp_dir.path().join("broker.db");
    let store = SqlStore::create(&db_path).unwrap();
    store.create_instance_details("123", &instance("svc-1")).unwrap();
    store.create_instance_details("456", &instance("svc-2")).unwrap();
    store.create_binding_details("b-1", &binding("app-1")).unwrap();
    db_path
}

async fn mount_secret_store(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/info"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"auth-server": {"url": server.uri()}})),
        )
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "token-1"})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/data"))
        .and(query_param("name", "/broker-1/activated"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

#[test]
fn test_missing_settings_are_reported() {
    let output = broker_migrate().output().unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--db-path"), "{}", stderr);
    assert!(stderr.contains("--store-id"), "{}", stderr);
}

#[test]
fn test_missing_database_exits_cleanly() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_against(
        &temp_dir.path().join("absent.db"),
        "http://127.0.0.1:9",
        &[],
    );

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "Source database does not exist; nothing to migrate"
    );
    assert!(!temp_dir.path().join("absent.db").exists());
}

#[test]
fn test_fatal_log_level_is_accepted() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_against(
        &temp_dir.path().join("absent.db"),
        "http://127.0.0.1:9",
        &["--log-level", "fatal", "--dry-run"],
    );

    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "Source database does not exist; nothing to migrate"
    );
}

#[test]
fn test_unreachable_mysql_server_exits_non_zero() {
    let output = broker_migrate()
        .args(["--db-driver", "mysql"])
        .args(["--db-hostname", "127.0.0.1", "--db-port", "1"])
        .args(["--db-name", "broker", "--db-username", "broker", "--db-password", ""])
        .args(["--secret-store-url", "http://127.0.0.1:9"])
        .args(["--uaa-client-id", "broker-client"])
        .args(["--uaa-client-secret", "s3cret"])
        .args(["--store-id", "broker-1"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Store unavailable"), "{}", stderr);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_full_run_migrates_and_retires() {
    let server = MockServer::start().await;
    mount_secret_store(&server).await;
    for name in [
        "/broker-1/instances/123",
        "/broker-1/instances/456",
        "/broker-1/bindings/b-1",
        "/broker-1/activated",
    ] {
        Mock::given(method("PUT"))
            .and(path("/api/v1/data"))
            .and(body_partial_json(json!({ "name": name })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
    }

    let temp_dir = TempDir::new().unwrap();
    let db_path = seeded_database(&temp_dir);
    let url = server.uri();
    let run_path = db_path.clone();
    let output = tokio::task::spawn_blocking(move || run_against(&run_path, &url, &[]))
        .await
        .unwrap();

    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "Migrated 2 instance(s) and 1 binding(s); destination activated, source retired"
    );
    assert!(SqlStore::open(&db_path).unwrap().is_retired().unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dry_run_writes_nothing() {
    let server = MockServer::start().await;
    mount_secret_store(&server).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let db_path = seeded_database(&temp_dir);
    let url = server.uri();
    let run_path = db_path.clone();
    let output = tokio::task::spawn_blocking(move || run_against(&run_path, &url, &["--dry-run"]))
        .await
        .unwrap();

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "Would migrate 2 instance(s) and 1 binding(s)"
    );
    assert!(!SqlStore::open(&db_path).unwrap().is_retired().unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_write_failure_exits_non_zero() {
    let server = MockServer::start().await;
    mount_secret_store(&server).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let db_path = seeded_database(&temp_dir);
    let url = server.uri();
    let run_path = db_path.clone();
    let output = tokio::task::spawn_blocking(move || run_against(&run_path, &url, &[]))
        .await
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("(category: write)"), "{}", stderr);
    assert!(!SqlStore::open(&db_path).unwrap().is_retired().unwrap());
}
