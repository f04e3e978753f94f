//! Route tests for the Alertmanager API.

use ar_api::{ApiServer, AppState};
use ar_core::{
    AlertmanagerConfiguration, ConfigStore, IntegrationRegistry, MockIntegration, Receiver,
    ReceiverConfig, REDACTED,
};
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn registry() -> Arc<IntegrationRegistry> {
    Arc::new(
        IntegrationRegistry::new()
            .with(MockIntegration::new("webhook").requiring_setting("url"))
            .with(MockIntegration::new("slow").with_delay(Duration::from_secs(60))),
    )
}

fn initial_config() -> AlertmanagerConfiguration {
    AlertmanagerConfiguration::new(
        Receiver::new("ops").with_config(
            ReceiverConfig::new("hook", "webhook")
                .with_uid("hook")
                .with_setting("url", "http://localhost/hook")
                .with_secure_setting("password", "hunter2"),
        ),
    )
}

fn app() -> (Router, AppState) {
    let store = Arc::new(ConfigStore::new(initial_config()).unwrap());
    let state = AppState::new(store, registry(), Duration::from_secs(5));
    (ApiServer::with_state(state.clone()).router(), state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn webhook(uid: &str, url: Option<&str>) -> Value {
    let settings = match url {
        Some(url) => json!({ "url": url }),
        None => json!({}),
    };
    json!({ "uid": uid, "name": uid, "type": "webhook", "settings": settings })
}

fn slow(uid: &str) -> Value {
    json!({ "uid": uid, "name": uid, "type": "slow", "settings": {} })
}

#[tokio::test(start_paused = true)]
async fn invalid_config_beats_timeout() {
    let (app, _) = app();
    let body = json!({
        "receivers": [
            { "name": "test1", "configs": [webhook("uid1", None)] },
            { "name": "test2", "configs": [slow("uid2")] },
        ]
    });

    let (status, json) = send(&app, "POST", "/api/alertmanager/receivers/test", Some(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["receivers"][0]["name"], "test1");
    assert_eq!(json["receivers"][0]["configs"][0]["uid"], "uid1");
    assert_eq!(json["receivers"][0]["configs"][0]["status"], "failed");
    assert_eq!(
        json["receivers"][0]["configs"][0]["error"]["kind"],
        "invalid_configuration"
    );
    assert_eq!(json["receivers"][1]["configs"][0]["error"]["kind"], "timeout");
}

#[tokio::test(start_paused = true)]
async fn timeout_is_request_timeout() {
    let (app, _) = app();
    let body = json!({
        "receivers": [{ "name": "ops", "configs": [webhook("ok", Some("http://x/")), slow("slow")] }]
    });

    let (status, json) = send(&app, "POST", "/api/alertmanager/receivers/test", Some(body)).await;

    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(json["receivers"][0]["configs"][0]["status"], "ok");
    assert!(json["receivers"][0]["configs"][0].get("error").is_none());
}

#[tokio::test]
async fn all_ok_is_200_with_alert() {
    let (app, _) = app();
    let body = json!({
        "alert": { "labels": { "severity": "critical" } },
        "receivers": [{ "name": "ops", "configs": [webhook("a", Some("http://x/"))] }]
    });

    let (status, json) = send(&app, "POST", "/api/alertmanager/receivers/test", Some(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["alert"]["labels"]["severity"], "critical");
    assert_eq!(json["alert"]["labels"]["alertname"], "TestAlert");
    assert!(json["notified_at"].is_string());
}

#[tokio::test]
async fn empty_request_tests_active_configuration() {
    let (app, _) = app();
    let (status, json) = send(
        &app,
        "POST",
        "/api/alertmanager/receivers/test",
        Some(json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["receivers"][0]["name"], "ops");
    assert_eq!(json["receivers"][0]["configs"][0]["uid"], "hook");
}

#[tokio::test]
async fn duplicate_receiver_names_are_rejected() {
    let (app, _) = app();
    let body = json!({
        "receivers": [
            { "name": "ops", "configs": [] },
            { "name": "ops", "configs": [] },
        ]
    });

    let (status, json) = send(&app, "POST", "/api/alertmanager/receivers/test", Some(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["details"]["receivers"][0]["code"], "duplicate");
}

#[tokio::test]
async fn status_reports_active_revision() {
    let (app, state) = app();
    let (status, json) = send(&app, "GET", "/api/alertmanager/status", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["revision"], 1);
    assert_eq!(json["config_hash"], state.store.revision().await.hash);
    assert_eq!(
        json["config"]["receivers"][0]["configs"][0]["secure_settings"]["password"],
        REDACTED
    );
    assert_eq!(json["version_info"]["name"], "alert-relay");
}

#[tokio::test]
async fn post_config_applies_and_get_config_redacts() {
    let (app, _) = app();
    let mut config = serde_json::to_value(initial_config()).unwrap();
    config["receivers"]
        .as_array_mut()
        .unwrap()
        .push(json!({ "name": "db", "configs": [] }));

    let (status, json) = send(&app, "POST", "/api/alertmanager/config", Some(config.clone())).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["revision"], 2);
    assert_eq!(json["changed"], true);

    let (status, json) = send(&app, "POST", "/api/alertmanager/config", Some(config)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["changed"], false);
    assert_eq!(json["revision"], 2);

    let (status, json) = send(&app, "GET", "/api/alertmanager/config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["receivers"][1]["name"], "db");
    assert_eq!(
        json["receivers"][0]["configs"][0]["secure_settings"]["password"],
        REDACTED
    );
}

#[tokio::test]
async fn invalid_config_is_rejected_and_store_unchanged() {
    let (app, state) = app();
    let before = state.store.revision().await;

    let mut config = serde_json::to_value(initial_config()).unwrap();
    config["route"]["receiver"] = json!("nobody");
    let (status, json) = send(&app, "POST", "/api/alertmanager/config", Some(config)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].as_str().unwrap().contains("nobody"));
    assert_eq!(state.store.revision().await, before);
}

#[tokio::test]
async fn unparseable_config_is_bad_request() {
    let (app, _) = app();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/alertmanager/config")
                .body(Body::from("{ definitely not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_and_metrics() {
    let (app, _) = app();

    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["config_revision"], 1);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn health_is_served_under_api_prefix() {
    let (app, state) = app();

    let (status, json) = send(&app, "GET", "/api/alertmanager/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], state.status.version_info().version);
}

#[tokio::test(start_paused = true)]
async fn health_uptime_matches_status() {
    let (app, _) = app();
    tokio::time::advance(Duration::from_secs(120)).await;

    let (_, health) = send(&app, "GET", "/health", None).await;
    let (_, status) = send(&app, "GET", "/api/alertmanager/status", None).await;

    assert!(health["uptime_seconds"].as_u64().unwrap() >= 120);
    assert_eq!(health["uptime_seconds"], status["uptime_seconds"]);
}

#[tokio::test]
async fn unknown_route_is_json_not_found() {
    let (app, _) = app();

    let (status, json) = send(&app, "GET", "/api/alertmanager/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert!(json["message"].as_str().unwrap().contains("/api/alertmanager/nope"));
}

#[tokio::test]
async fn malformed_test_body_is_json_bad_request() {
    let (app, _) = app();

    for body in ["{ definitely not json", r#"{"receivers": "ops"}"#] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/alertmanager/receivers/test")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["code"], "BAD_REQUEST");
        assert!(!json["message"].as_str().unwrap().is_empty());
    }
}

#[tokio::test]
async fn responses_carry_request_id() {
    let (app, _) = app();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("X-Request-Id", "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "abc-123");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
}

#[tokio::test]
async fn shutdown_rejects_new_tests() {
    let (app, state) = app();
    state.shutdown.cancel();

    let (status, json) = send(
        &app,
        "POST",
        "/api/alertmanager/receivers/test",
        Some(json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "SERVICE_UNAVAILABLE");
}
