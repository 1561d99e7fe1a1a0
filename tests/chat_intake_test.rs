mod common;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;

use automation_gateway::models::automation_run::RunStatus;
use common::*;

fn chat_body(external_message_id: &str) -> serde_json::Value {
    json!({
        "from": "+15550001",
        "to": TENANT_PHONE,
        "external_message_id": external_message_id,
        "text": "hi, are you open today?",
    })
}

#[tokio::test]
async fn missing_signature_is_rejected_before_any_write() {
    let h = harness(EngineBehavior::Reply(r#"{"response_text":"yes"}"#));

    let response = send(&h.app, unsigned_post("/api/webhooks/chat", &chat_body("wamid.1"))).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(h.run_store.is_empty());
    assert_eq!(h.transport.calls(), 0);
}

#[tokio::test]
async fn signature_from_another_boundary_is_rejected() {
    let h = harness(EngineBehavior::Reply(r#"{"response_text":"yes"}"#));

    let request = signed_post("/api/webhooks/chat", VOICE_SECRET, &chat_body("wamid.1"));
    let response = send(&h.app, request).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(h.run_store.is_empty());
}

#[tokio::test]
async fn accepted_event_dispatches_in_background() {
    let h = harness(EngineBehavior::Reply(r#"{"response_text":"we are open"}"#));

    let request = signed_post("/api/webhooks/chat", CHAT_SECRET, &chat_body("wamid.2"));
    let response = send(&h.app, request).await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let ack = response_json(response).await;
    assert_eq!(ack["accepted"], true);
    let run_id: uuid::Uuid = ack["run_id"].as_str().unwrap().parse().unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let run = h.state.run_ledger.find(run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(
        run.response_payload.unwrap()["response_text"],
        "we are open"
    );
    assert_eq!(h.transport.calls(), 1);
}

#[tokio::test]
async fn duplicate_delivery_returns_same_run_without_second_dispatch() {
    let h = harness(EngineBehavior::Reply(r#"{"response_text":"hello"}"#));

    let first = send(
        &h.app,
        signed_post("/api/webhooks/chat", CHAT_SECRET, &chat_body("wamid.3")),
    )
    .await;
    assert_eq!(first.status(), StatusCode::ACCEPTED);
    let first_id = response_json(first).await["run_id"].as_str().unwrap().to_string();

    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = send(
        &h.app,
        signed_post("/api/webhooks/chat", CHAT_SECRET, &chat_body("wamid.3")),
    )
    .await;
    assert_eq!(second.status(), StatusCode::OK);
    let ack = response_json(second).await;
    assert_eq!(ack["run_id"].as_str().unwrap(), first_id);
    assert_eq!(ack["message"], "duplicate_delivery");

    assert_eq!(h.run_store.len(), 1);
    assert_eq!(h.transport.calls(), 1);
}

#[tokio::test]
async fn unknown_recipient_is_not_found() {
    let h = harness(EngineBehavior::Reply(r#"{"response_text":"x"}"#));

    let body = json!({
        "from": "+15550001",
        "to": "+19990000",
        "external_message_id": "wamid.4",
        "text": "hello?",
    });
    let response = send(&h.app, signed_post("/api/webhooks/chat", CHAT_SECRET, &body)).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(h.run_store.is_empty());
    assert_eq!(h.transport.calls(), 0);
}

#[tokio::test]
async fn non_json_body_fails_the_signature_gate() {
    // A body that is not JSON at all cannot be canonicalized, so it fails at
    // the signature gate rather than at deserialization.
    let h = harness(EngineBehavior::Reply(r#"{"response_text":"x"}"#));

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/webhooks/chat")
        .header("content-type", "application/json")
        .header("x-timestamp", chrono::Utc::now().timestamp().to_string())
        .header("x-signature", "deadbeef")
        .body(axum::body::Body::from("not json"))
        .unwrap();
    let response = send(&h.app, request).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(h.run_store.is_empty());
}
