#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end pipeline tests
//!
//! Every upstream (gateway, secret store, federation catalogs) is a wiremock
//! server. Each test mounts exactly the calls a correct run makes; `expect`
//! counts double as assertions that nothing extra was called.

use fedsync::{
    AuditSink, CatalogClient, HttpSecretStore, NoopAuditSink, RegistryClient, RegistryConfig,
    SchemaValidator, SecretStore,
};
use fedsync_pull::pipeline::Pipeline;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{any, body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn build_pipeline(
    gateway: &MockServer,
    secret_store: &MockServer,
    invalidate_on_error: bool,
) -> Pipeline {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();
    let validator = Arc::new(SchemaValidator::default_catalog().unwrap());
    let audit: Arc<dyn AuditSink> = Arc::new(NoopAuditSink);

    let registry = Arc::new(RegistryClient::new(
        client.clone(),
        RegistryConfig {
            base_url: gateway.uri(),
            auth_url: format!("{}/login", gateway.uri()),
            service_email: "pull-service@example.com".to_string(),
            service_password: "hunter2".to_string(),
            user_id: "42".to_string(),
            origin_tag: "FEDSYNC".to_string(),
            invalidate_on_error,
        },
        audit.clone(),
    ));

    let catalog = Arc::new(CatalogClient::new(
        client.clone(),
        validator,
        audit.clone(),
    ));

    let secrets: Arc<dyn SecretStore> =
        Arc::new(HttpSecretStore::new(client, &secret_store.uri()));

    Pipeline::new(registry, catalog, secrets, audit)
}

fn federation_json(id: i64, team_id: i64, auth_type: &str, secret: &str, base_url: &str) -> Value {
    json!({
        "id": id,
        "auth_type": auth_type,
        "auth_secret_key": secret,
        "endpoint_baseurl": base_url,
        "endpoint_datasets": "/api/v1/datasets",
        "endpoint_dataset": "/api/v1/datasets/{id}",
        "enabled": true,
        "team": [{"id": team_id, "name": "team", "enabled": true}]
    })
}

fn catalog_item(pid: &str, version: &str) -> Value {
    json!({
        "persistentId": pid,
        "version": version,
        "name": format!("Dataset {}", pid),
        "type": "dataset"
    })
}

async fn mount_login(gateway: &MockServer, expected_logins: u64) {
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(json!({
            "email": "pull-service@example.com",
            "password": "hunter2"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "jwt-1"})))
        .expect(expected_logins)
        .mount(gateway)
        .await;
}

async fn mount_federations(gateway: &MockServer, federations: Value) {
    Mock::given(method("GET"))
        .and(path("/federations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(federations))
        .mount(gateway)
        .await;
}

async fn mount_existing(gateway: &MockServer, team_id: i64, existing: Value) {
    Mock::given(method("GET"))
        .and(path("/datasets"))
        .and(query_param("team_id", team_id.to_string()))
        .and(query_param("create_origin", "FEDSYNC"))
        .and(query_param("onlyDatasets", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(existing))
        .mount(gateway)
        .await;
}

async fn mount_bearer_secret(store: &MockServer, name: &str, token: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/api/secrets/{}/versions/latest", name)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "payload": format!("{{\"bearer_token\":\"{}\"}}", token)
        })))
        .mount(store)
        .await;
}

#[tokio::test]
async fn test_full_reconciliation_flow() {
    let gateway = MockServer::start().await;
    let secret_store = MockServer::start().await;
    let upstream = MockServer::start().await;

    // One login serves the whole run
    mount_login(&gateway, 1).await;
    mount_federations(
        &gateway,
        json!([federation_json(7, 18, "BEARER", "fed-7", &upstream.uri())]),
    )
    .await;
    mount_bearer_secret(&secret_store, "fed-7", "fed-token").await;

    // Remote catalog: one new PID, one changed version, one unchanged
    Mock::given(method("GET"))
        .and(path("/api/v1/datasets"))
        .and(wiremock::matchers::header(
            "Authorization",
            "Bearer fed-token",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                catalog_item("pid-new", "1.0.0"),
                catalog_item("pid-upd", "2.0.0"),
                catalog_item("pid-same", "1.0.0"),
            ],
            "query": {}
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    // Gateway baseline: pid-gone is no longer upstream
    mount_existing(
        &gateway,
        18,
        json!({
            "pid-upd": {"versions": ["1.0.0"]},
            "pid-same": {"versions": ["1.0.0"]},
            "pid-gone": {"versions": ["1.0.0"]}
        }),
    )
    .await;

    // Item documents are fetched only for create and update
    Mock::given(method("GET"))
        .and(path("/api/v1/datasets/pid-new"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"persistentId": "pid-new"})),
        )
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/datasets/pid-upd"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"persistentId": "pid-upd"})),
        )
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/datasets/pid-same"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/federations/delete/pid-gone"))
        .and(body_json(json!({"team_id": "18"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&gateway)
        .await;
    Mock::given(method("POST"))
        .and(path("/federations"))
        .and(body_partial_json(json!({
            "pid": "pid-new",
            "team_id": "18",
            "user_id": "42",
            "create_origin": "FEDSYNC",
            "status": "ACTIVE"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&gateway)
        .await;
    Mock::given(method("PUT"))
        .and(path("/federations/update/pid-upd"))
        .and(body_partial_json(json!({"pid": "pid-upd", "team_id": "18"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&gateway)
        .await;

    let pipeline = build_pipeline(&gateway, &secret_store, false);
    let summary = pipeline.run_once().await;

    assert_eq!(summary.federations, 1);
    assert_eq!(summary.synced, 1);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.created, 1);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.unchanged, 1);
    assert_eq!(summary.item_failures, 0);
    assert_eq!(summary.write_failures, 0);
}

#[tokio::test]
async fn test_upstream_500_invalidates_once_and_run_continues() {
    let gateway = MockServer::start().await;
    let secret_store = MockServer::start().await;
    let broken = MockServer::start().await;
    let healthy = MockServer::start().await;

    mount_login(&gateway, 1).await;
    mount_federations(
        &gateway,
        json!([
            federation_json(1, 10, "NO_AUTH", "", &broken.uri()),
            federation_json(2, 20, "BEARER", "fed-2", &healthy.uri()),
        ]),
    )
    .await;
    mount_bearer_secret(&secret_store, "fed-2", "token-b").await;

    Mock::given(method("GET"))
        .and(path("/api/v1/datasets"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&broken)
        .await;

    // The broken federation is disabled exactly once; the healthy one never
    Mock::given(method("PATCH"))
        .and(path("/federations/1"))
        .and(body_json(json!({"enabled": 0, "tested": 0})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&gateway)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/federations/2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&gateway)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/datasets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [catalog_item("pid-b1", "1.0.0")],
            "query": {}
        })))
        .expect(1)
        .mount(&healthy)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/datasets/pid-b1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"persistentId": "pid-b1"})),
        )
        .expect(1)
        .mount(&healthy)
        .await;
    mount_existing(&gateway, 20, json!({})).await;
    Mock::given(method("POST"))
        .and(path("/federations"))
        .and(body_partial_json(json!({"pid": "pid-b1", "team_id": "20"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&gateway)
        .await;

    let pipeline = build_pipeline(&gateway, &secret_store, true);
    let summary = pipeline.run_once().await;

    assert_eq!(summary.federations, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.synced, 1);
    assert_eq!(summary.created, 1);
}

#[tokio::test]
async fn test_invalidation_disabled_never_patches() {
    let gateway = MockServer::start().await;
    let secret_store = MockServer::start().await;
    let upstream = MockServer::start().await;

    mount_login(&gateway, 1).await;
    mount_federations(
        &gateway,
        json!([federation_json(5, 50, "NO_AUTH", "", &upstream.uri())]),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/datasets"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&upstream)
        .await;

    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&gateway)
        .await;

    let pipeline = build_pipeline(&gateway, &secret_store, false);
    let summary = pipeline.run_once().await;

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.synced, 0);
}

#[tokio::test]
async fn test_item_failure_skips_item_but_not_siblings() {
    let gateway = MockServer::start().await;
    let secret_store = MockServer::start().await;
    let upstream = MockServer::start().await;

    mount_login(&gateway, 1).await;
    mount_federations(
        &gateway,
        json!([federation_json(3, 30, "NO_AUTH", "", &upstream.uri())]),
    )
    .await;
    mount_existing(&gateway, 30, json!({})).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/datasets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                catalog_item("pid-bad", "1.0.0"),
                catalog_item("pid-ok", "1.0.0"),
            ],
            "query": {}
        })))
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/datasets/pid-bad"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/datasets/pid-ok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"persistentId": "pid-ok"})))
        .expect(1)
        .mount(&upstream)
        .await;

    // The failed item is never written; its sibling still is
    Mock::given(method("POST"))
        .and(path("/federations"))
        .and(body_partial_json(json!({"pid": "pid-bad"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&gateway)
        .await;
    Mock::given(method("POST"))
        .and(path("/federations"))
        .and(body_partial_json(json!({"pid": "pid-ok"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&gateway)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/federations/3"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&gateway)
        .await;

    let pipeline = build_pipeline(&gateway, &secret_store, true);
    let summary = pipeline.run_once().await;

    assert_eq!(summary.synced, 1);
    assert_eq!(summary.created, 1);
    assert_eq!(summary.item_failures, 1);
    assert_eq!(summary.write_failures, 0);
}

#[tokio::test]
async fn test_credential_failure_skips_federation() {
    let gateway = MockServer::start().await;
    let secret_store = MockServer::start().await;
    let upstream = MockServer::start().await;

    mount_login(&gateway, 1).await;
    mount_federations(
        &gateway,
        json!([federation_json(4, 40, "BEARER", "missing-secret", &upstream.uri())]),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/api/secrets/missing-secret/versions/latest"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&secret_store)
        .await;

    // Without a credential the upstream is never contacted
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&gateway)
        .await;

    let pipeline = build_pipeline(&gateway, &secret_store, true);
    let summary = pipeline.run_once().await;

    assert_eq!(summary.federations, 1);
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn test_no_auth_federation_syncs_unauthenticated() {
    let gateway = MockServer::start().await;
    let secret_store = MockServer::start().await;
    let upstream = MockServer::start().await;

    mount_login(&gateway, 1).await;
    mount_federations(
        &gateway,
        json!([federation_json(6, 60, "NO_AUTH", "", &upstream.uri())]),
    )
    .await;
    mount_existing(&gateway, 60, json!({})).await;

    // The secret backend must never be consulted for NO_AUTH
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&secret_store)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/datasets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [catalog_item("pid-n1", "1.0.0")],
            "query": {}
        })))
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/datasets/pid-n1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"persistentId": "pid-n1"})))
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/federations"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&gateway)
        .await;

    let pipeline = build_pipeline(&gateway, &secret_store, false);
    let summary = pipeline.run_once().await;

    assert_eq!(summary.created, 1);

    for request in upstream.received_requests().await.unwrap() {
        assert!(
            !request.headers.contains_key("authorization"),
            "NO_AUTH request must carry no auth header"
        );
    }
}

#[tokio::test]
async fn test_write_failure_counts_and_continues() {
    let gateway = MockServer::start().await;
    let secret_store = MockServer::start().await;
    let upstream = MockServer::start().await;

    mount_login(&gateway, 1).await;
    mount_federations(
        &gateway,
        json!([federation_json(8, 80, "NO_AUTH", "", &upstream.uri())]),
    )
    .await;
    mount_existing(&gateway, 80, json!({})).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/datasets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                catalog_item("pid-1", "1.0.0"),
                catalog_item("pid-2", "1.0.0"),
            ],
            "query": {}
        })))
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/datasets/pid-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"persistentId": "pid-1"})))
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/datasets/pid-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"persistentId": "pid-2"})))
        .expect(1)
        .mount(&upstream)
        .await;

    Mock::given(method("POST"))
        .and(path("/federations"))
        .and(body_partial_json(json!({"pid": "pid-1"})))
        .respond_with(ResponseTemplate::new(422))
        .expect(1)
        .mount(&gateway)
        .await;
    Mock::given(method("POST"))
        .and(path("/federations"))
        .and(body_partial_json(json!({"pid": "pid-2"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&gateway)
        .await;

    let pipeline = build_pipeline(&gateway, &secret_store, false);
    let summary = pipeline.run_once().await;

    assert_eq!(summary.synced, 1);
    assert_eq!(summary.created, 1);
    assert_eq!(summary.write_failures, 1);
}

#[tokio::test]
async fn test_federation_without_team_is_skipped() {
    let gateway = MockServer::start().await;
    let secret_store = MockServer::start().await;
    let upstream = MockServer::start().await;

    mount_login(&gateway, 1).await;
    mount_federations(
        &gateway,
        json!([{
            "id": 9,
            "auth_type": "NO_AUTH",
            "auth_secret_key": "",
            "endpoint_baseurl": upstream.uri(),
            "endpoint_datasets": "/api/v1/datasets",
            "endpoint_dataset": "/api/v1/datasets/{id}",
            "enabled": true,
            "team": []
        }]),
    )
    .await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let pipeline = build_pipeline(&gateway, &secret_store, false);
    let summary = pipeline.run_once().await;

    assert_eq!(summary.federations, 1);
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn test_unknown_auth_method_skips_federation() {
    let gateway = MockServer::start().await;
    let secret_store = MockServer::start().await;
    let upstream = MockServer::start().await;

    mount_login(&gateway, 1).await;
    mount_federations(
        &gateway,
        json!([federation_json(11, 90, "KERBEROS", "fed-11", &upstream.uri())]),
    )
    .await;

    // Neither the secret backend nor the upstream is touched
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&secret_store)
        .await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let pipeline = build_pipeline(&gateway, &secret_store, false);
    let summary = pipeline.run_once().await;

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.synced, 0);
}

#[tokio::test]
async fn test_failed_federation_listing_yields_empty_run() {
    let gateway = MockServer::start().await;
    let secret_store = MockServer::start().await;

    mount_login(&gateway, 1).await;
    Mock::given(method("GET"))
        .and(path("/federations"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&gateway)
        .await;

    let pipeline = build_pipeline(&gateway, &secret_store, false);
    let summary = pipeline.run_once().await;

    assert_eq!(summary.federations, 0);
    assert_eq!(summary.synced, 0);
    assert_eq!(summary.skipped, 0);
}
