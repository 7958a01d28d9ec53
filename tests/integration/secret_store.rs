//! Integration tests for the secret store client against a mock credential API

use broker_store_migrator::error::{MigrationError, StoreError};
use broker_store_migrator::migration::{MigrationOutcome, MigrationSummary, Migrator, NoopObserver};
use broker_store_migrator::store::{
    Activation, MemoryStore, RecordSink, RecordSource, SecretStore, SecretStoreSettings,
};
use broker_store_migrator::types::{BindingDetails, ServiceInstance};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(server: &MockServer) -> SecretStoreSettings {
    SecretStoreSettings {
        url: server.uri(),
        ca_cert_pem: None,
        client_id: "broker-client".to_string(),
        client_secret: "s3cret".to_string(),
        uaa_ca_cert_pem: None,
        store_id: "broker-1".to_string(),
    }
}

async fn mount_auth(server: &MockServer, token_requests: u64) {
    Mock::given(method("GET"))
        .and(path("/info"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"auth-server": {"url": server.uri()}})),
        )
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token-1",
            "token_type": "bearer"
        })))
        .expect(token_requests)
        .mount(server)
        .await;
}

async fn blocking<F, T>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_migrates_into_secret_store() {
    let server = MockServer::start().await;
    mount_auth(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/data"))
        .and(query_param("name", "/broker-1/activated"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/data"))
        .and(header("authorization", "Bearer token-1"))
        .and(body_partial_json(json!({
            "name": "/broker-1/instances/123",
            "type": "json",
            "mode": "overwrite",
            "value": {"service_id": "svc-1"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/data"))
        .and(body_partial_json(json!({
            "name": "/broker-1/bindings/b-1",
            "value": {"app_guid": "app-1"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/data"))
        .and(body_partial_json(json!({"name": "/broker-1/activated"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let settings = settings(&server);
    let outcome = blocking(move || {
        let source = MemoryStore::new()
            .with_instances([(
                "123".to_string(),
                ServiceInstance {
                    service_id: Some("svc-1".to_string()),
                    ..Default::default()
                },
            )])
            .with_bindings([(
                "b-1".to_string(),
                BindingDetails {
                    app_guid: Some("app-1".to_string()),
                    ..Default::default()
                },
            )]);
        let destination = SecretStore::new(settings).unwrap();
        Migrator::new(NoopObserver).migrate(&source, &destination)
    })
    .await
    .unwrap();

    assert_eq!(
        outcome,
        MigrationOutcome::Migrated(MigrationSummary {
            instances: 1,
            bindings: 1
        })
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_activated_marker_skips_migration() {
    let server = MockServer::start().await;
    mount_auth(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/data"))
        .and(query_param("name", "/broker-1/activated"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"name": "/broker-1/activated", "value": {"activated_at": "2026-01-01T00:00:00Z"}}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let settings = settings(&server);
    let outcome = blocking(move || {
        let source = MemoryStore::new();
        let destination = SecretStore::new(settings).unwrap();
        Migrator::new(NoopObserver).migrate(&source, &destination)
    })
    .await
    .unwrap();

    assert_eq!(outcome, MigrationOutcome::AlreadyActivated);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_lists_instances_by_path() {
    let server = MockServer::start().await;
    mount_auth(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/data"))
        .and(query_param("path", "/broker-1/instances"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "credentials": [
                {"name": "/broker-1/instances/123"},
                {"name": "/other-store/instances/999"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/data"))
        .and(query_param("name", "/broker-1/instances/123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"value": {"service_id": "svc-1", "plan_id": "plan-small"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let settings = settings(&server);
    let instances = blocking(move || {
        SecretStore::new(settings)
            .unwrap()
            .retrieve_all_instance_details()
    })
    .await
    .unwrap();

    assert_eq!(instances.len(), 1);
    assert_eq!(instances["123"].service_id.as_deref(), Some("svc-1"));
    assert_eq!(instances["123"].plan_id.as_deref(), Some("plan-small"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_refreshes_token_once_on_unauthorized() {
    let server = MockServer::start().await;
    mount_auth(&server, 2).await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/data"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let settings = settings(&server);
    let result = blocking(move || SecretStore::new(settings).unwrap().activate()).await;

    assert!(result.is_ok(), "{:?}", result);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_server_error_fails_the_write() {
    let server = MockServer::start().await;
    mount_auth(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/data"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/data"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let settings = settings(&server);
    let err = blocking(move || {
        let source = MemoryStore::new().with_instances([("123".to_string(), ServiceInstance::default())]);
        let destination = SecretStore::new(settings).unwrap();
        Migrator::new(NoopObserver).migrate(&source, &destination)
    })
    .await
    .unwrap_err();

    match err {
        MigrationError::WriteFailed { id, error, .. } => {
            assert_eq!(id, "123");
            assert!(matches!(
                error,
                StoreError::UnexpectedStatus { status: 500, ref body } if body == "boom"
            ));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_unreachable_server_is_unavailable() {
    let store = SecretStore::new(SecretStoreSettings {
        url: "http://127.0.0.1:1".to_string(),
        ca_cert_pem: None,
        client_id: "broker-client".to_string(),
        client_secret: "s3cret".to_string(),
        uaa_ca_cert_pem: None,
        store_id: "broker-1".to_string(),
    })
    .unwrap();

    assert!(matches!(
        store.is_activated(),
        Err(StoreError::Unavailable(_))
    ));
    assert!(store
        .create_binding_details("b-1", &BindingDetails::default())
        .is_err());
}
