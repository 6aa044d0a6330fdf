//! HTTP-level tests for the Relay server router, driven in-process via
//! `tower::ServiceExt::oneshot` against an in-memory database.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use relay_core::integration::PlatformCatalog;
use relay_core::models::credential::CredentialRecord;
use relay_core::state::{AppState, AppStateInner};
use relay_core::workflow::encode_credential;
use relay_core::{Database, EngineConfig};
use relay_server::build_router;

fn test_state(catalog: PlatformCatalog) -> AppState {
    let db = Database::open(":memory:").expect("Failed to open in-memory database");
    Arc::new(AppStateInner::with_config(db, EngineConfig::default(), catalog))
}

async fn send(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        })
        .unwrap();
    let response = build_router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health() {
    let state = test_state(PlatformCatalog::new());
    let (status, body) = send(&state, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["server"], "relay-server");
}

#[tokio::test]
async fn test_create_rejects_invalid_blueprint() {
    let state = test_state(PlatformCatalog::new());
    let (status, body) = send(
        &state,
        "POST",
        "/api/automations",
        Some(json!({
            "userId": "u1",
            "name": "Broken",
            "blueprint": { "steps": [ { "id": "x", "type": "teleport" } ] }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Unknown step type: teleport"));
}

#[tokio::test]
async fn test_register_execute_and_fetch_run() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat.postMessage")
        .match_header("authorization", "Bearer xoxb-1")
        .with_status(200)
        .with_body(r#"{"ok":true,"ts":"123"}"#)
        .create_async()
        .await;

    let catalog = PlatformCatalog::from_json(&format!(
        r#"{{ "slack": {{
            "name": "slack",
            "base_url": "{}",
            "auth_config": {{ "type": "bearer", "parameter_name": "Authorization", "format": "Bearer {{token}}" }},
            "endpoints": {{ "post_message": {{ "method": "POST", "path": "/chat.postMessage" }} }}
        }} }}"#,
        server.url()
    ))
    .unwrap();
    let state = test_state(catalog);

    let (status, body) = send(
        &state,
        "POST",
        "/api/automations",
        Some(json!({
            "id": "notify",
            "userId": "u1",
            "name": "Notify",
            "blueprint": {
                "steps": [{
                    "id": "post", "type": "action",
                    "action": {
                        "integration": "slack", "method": "post_message",
                        "parameters": { "channel": "#ops", "text": "{{trigger.msg}}" },
                        "output_variable": "sent"
                    }
                }]
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["automation"]["id"], "notify");

    state
        .credential_store
        .save(&CredentialRecord::new(
            "c1".into(),
            "notify".into(),
            "u1".into(),
            "slack".into(),
            encode_credential(json!({ "token": "xoxb-1" }).as_object().unwrap()),
        ))
        .await
        .unwrap();

    let (status, outcome) = send(
        &state,
        "POST",
        "/api/automations/notify/execute",
        Some(json!({ "userId": "u1", "triggerData": { "msg": "hello" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["success"], true, "outcome: {outcome}");
    assert_eq!(outcome["result"]["sent"], json!({ "ok": true, "ts": "123" }));
    mock.assert_async().await;

    let run_id = outcome["runId"].as_str().unwrap();
    let (status, body) = send(&state, "GET", &format!("/api/runs/{}", run_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["run"]["status"], "completed");
    assert_eq!(body["run"]["progress"]["totalSteps"], 1);

    let (_, body) = send(&state, "GET", "/api/automations/notify/runs", None).await;
    assert_eq!(body["runs"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_execute_unknown_automation_reports_failure() {
    let state = test_state(PlatformCatalog::new());
    let (status, outcome) = send(
        &state,
        "POST",
        "/api/automations/ghost/execute",
        Some(json!({ "userId": "u1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["success"], false);
    assert_eq!(outcome["error"], "Automation not found: ghost");
}

#[tokio::test]
async fn test_missing_run_is_404() {
    let state = test_state(PlatformCatalog::new());
    let (status, _) = send(&state, "GET", "/api/runs/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
