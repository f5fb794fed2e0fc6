//! Integration tests for the bench server
//!
//! Tests HTTP endpoints against a simulated prop

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use prop_runtime::config::PropConfig;
use prop_runtime::core::api::{router, AppState};
use prop_runtime::core::create_router;
use serde_json::Value;
use tower::ServiceExt;

fn create_test_state() -> Arc<AppState> {
    AppState::new(PropConfig::roue_fortune()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_router(PropConfig::roue_fortune()).unwrap();

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["contract"], "1.0");
    assert_eq!(json["prop_id"], "magie_roueFortune");
    assert_eq!(json["connected"], true);
}

#[tokio::test]
async fn test_status_snapshot() {
    let app = create_router(PropConfig::test_magnet()).unwrap();

    let response = app.oneshot(get("/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["type"], "status");
    assert_eq!(json["propId"], "magie_test_magnet");
    assert_eq!(json["solved"], false);
    assert_eq!(json["details"]["sensors"][0]["sensorId"], "magnet1");
}

#[tokio::test]
async fn test_force_solved_command() {
    let app = create_router(PropConfig::roue_fortune()).unwrap();

    let response = app
        .oneshot(post("/cmd", r#"{"type":"cmd","command":"force_solved","source":"gm"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["solved"], true);
    assert_eq!(json["override"], true);
    assert_eq!(json["lastChangeSource"], "gm");
}

#[tokio::test]
async fn test_garbage_command_is_ignored() {
    let app = create_router(PropConfig::roue_fortune()).unwrap();

    let response = app.oneshot(post("/cmd", "please open")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["solved"], false);
}

#[tokio::test]
async fn test_sensor_drive_and_solve() {
    let state = create_test_state();
    let app = router(Arc::clone(&state));

    let response = app
        .clone()
        .oneshot(post("/sensor/magnet1", r#"{"present": true}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["pin"], 27);
    assert_eq!(json["level"], "LOW");

    state.advance(50).await;

    let json = body_json(app.oneshot(get("/status")).await.unwrap()).await;
    assert_eq!(json["solved"], true);
    assert_eq!(json["lastChangeSource"], "player");
}

#[tokio::test]
async fn test_unknown_sensor_not_found() {
    let app = create_router(PropConfig::roue_fortune()).unwrap();

    let response = app
        .oneshot(post("/sensor/laser9", r#"{"present": true}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_button_resets() {
    let app = create_router(PropConfig::roue_fortune()).unwrap();

    let solved = body_json(
        app.clone()
            .oneshot(post("/cmd", r#"{"type":"cmd","command":"force_solved"}"#))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(solved["solved"], true);

    let json = body_json(app.oneshot(post("/button", "{}")).await.unwrap()).await;
    assert_eq!(json["solved"], false);
    assert_eq!(json["override"], false);
    assert_eq!(json["lastChangeSource"], "device");
    assert_eq!(json["details"]["outputs"][0]["state"], "armed");
}

#[tokio::test]
async fn test_network_toggle() {
    let state = create_test_state();
    let app = router(Arc::clone(&state));

    let json = body_json(
        app.clone()
            .oneshot(post("/network", r#"{"broker": false}"#))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(json["connected"], false);

    let json = body_json(
        app.clone()
            .oneshot(post("/network", r#"{"broker": true}"#))
            .await
            .unwrap(),
    )
    .await;
    // reconnect waits for the next tick
    assert_eq!(json["connected"], false);

    state.advance(3100).await;
    assert!(state.snapshot().await.online);
}

#[tokio::test]
async fn test_message_log() {
    let state = create_test_state();
    let app = router(Arc::clone(&state));

    app.clone()
        .oneshot(post("/cmd", r#"{"type":"cmd","command":"arm"}"#))
        .await
        .unwrap();

    let json = body_json(app.oneshot(get("/messages")).await.unwrap()).await;
    let log = json.as_array().unwrap();

    // online announcement, boot status, arm status
    assert_eq!(log.len(), 3);
    assert_eq!(log[0]["topic"], "ey/default/magie/prop/magie_roueFortune/lwt");
    assert!(log[0]["received_at"].is_string());
    assert_eq!(log[1]["retain"], true);
    let arm: Value = serde_json::from_str(log[2]["payload"].as_str().unwrap()).unwrap();
    assert_eq!(arm["details"]["outputs"][0]["state"], "armed");
}

#[tokio::test]
async fn test_live_updates_are_broadcast() {
    let state = create_test_state();
    let mut rx = state.subscribe();
    let app = router(Arc::clone(&state));

    app.oneshot(post("/cmd", "reset")).await.unwrap();

    let entry = rx.recv().await.unwrap();
    assert_eq!(entry.message.topic, "ey/default/magie/prop/magie_roueFortune/status");
    assert_eq!(entry.message.json().unwrap()["solved"], false);
}

#[tokio::test]
async fn test_button_hold_is_capped() {
    let state = create_test_state();
    let app = router(Arc::clone(&state));

    let json = body_json(
        app.oneshot(post("/button", r#"{"held_ms": 4000000000}"#))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(json["solved"], false);
    let uptime = json["timestamp"].as_u64().unwrap();
    assert!(uptime <= 10 * u64::from(prop_runtime::RESET_HOLD_MS) + 100, "uptime {}", uptime);
}
