use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use echolink::capability::{ConfiguredCapabilityGate, PermissionStatus};
use echolink::connection::LoopbackNetwork;
use echolink::session::{ControllerConfig, SessionController};
use echolink::speech::UnsupportedSpeechEngine;
use echolink::{create_router, AppState};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn router(network: &LoopbackNetwork, policy: PermissionStatus) -> Router {
    let (controller, handle) = SessionController::new(
        ControllerConfig::default(),
        Arc::new(ConfiguredCapabilityGate::new(policy, "test-mic")),
        Arc::new(network.clone()),
        Arc::new(UnsupportedSpeechEngine),
    );
    controller.with_id_source(|| "4821".to_string()).spawn();
    create_router(AppState::new(handle))
}

async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => request
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_check() {
    let app = router(&LoopbackNetwork::new(), PermissionStatus::Granted);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn test_status_starts_idle() {
    let app = router(&LoopbackNetwork::new(), PermissionStatus::Granted);

    let (status, json) = call(&app, "GET", "/session/status", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["lifecycle"], "idle");
    assert_eq!(json["role"], Value::Null);
}

#[tokio::test]
async fn test_host_then_abort() {
    let network = LoopbackNetwork::new();
    let app = router(&network, PermissionStatus::Granted);

    let (status, json) = call(&app, "POST", "/session/host", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["role"], "host");

    let (status, json) = call(&app, "POST", "/session/abort", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["lifecycle"], "idle");
    assert!(!network.is_registered("4821"));
}

#[tokio::test]
async fn test_join_unknown_channel_is_not_found() {
    let app = router(&LoopbackNetwork::new(), PermissionStatus::Granted);

    let (status, json) = call(&app, "POST", "/session/join/0007", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Channel ID not found or peer is offline.");
}

#[tokio::test]
async fn test_join_rejects_malformed_id() {
    let app = router(&LoopbackNetwork::new(), PermissionStatus::Granted);

    let (status, _) = call(&app, "POST", "/session/join/48.21", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_denied_microphone_is_forbidden() {
    let app = router(&LoopbackNetwork::new(), PermissionStatus::Denied);

    let (status, json) = call(&app, "POST", "/session/host", None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["message"], "Microphone access is required to use EchoLink.");
}

#[tokio::test]
async fn test_commands_out_of_state_conflict() {
    let app = router(&LoopbackNetwork::new(), PermissionStatus::Granted);

    let (status, _) = call(&app, "POST", "/session/hangup", None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(&app, "POST", "/session/acknowledge", None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let chat = serde_json::json!({ "text": "anyone there?" });
    let (status, _) = call(&app, "POST", "/session/chat", Some(chat)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_transcript_is_empty_before_call() {
    let app = router(&LoopbackNetwork::new(), PermissionStatus::Granted);

    let (status, json) = call(&app, "GET", "/session/transcript", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!([]));
}
