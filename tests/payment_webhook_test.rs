mod common;

use axum::http::StatusCode;
use serde_json::json;

use automation_gateway::database::event_store::WebhookEventStore;
use common::*;

fn payment_body(event_id: &str) -> serde_json::Value {
    json!({
        "id": event_id,
        "type": "invoice.paid",
        "data": { "amount": 4200, "currency": "usd" },
    })
}

#[tokio::test]
async fn first_delivery_is_processed_once() {
    let h = harness(EngineBehavior::Reply("{}"));

    let response = send(
        &h.app,
        signed_post("/api/webhooks/payments", PAYMENT_SECRET, &payment_body("evt_1")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let ack = response_json(response).await;
    assert_eq!(ack["received"], true);
    assert_eq!(ack["duplicate"], false);

    let entries = h.audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "payment_event_processed");
    assert_eq!(entries[0].detail["event_id"], "evt_1");

    let event = h.event_store.find("evt_1").await.unwrap().unwrap();
    assert!(event.processed);
    assert!(event.processed_at.is_some());
}

#[tokio::test]
async fn redelivery_is_acknowledged_without_reprocessing() {
    let h = harness(EngineBehavior::Reply("{}"));

    let first = send(
        &h.app,
        signed_post("/api/webhooks/payments", PAYMENT_SECRET, &payment_body("evt_2")),
    )
    .await;
    assert_eq!(response_json(first).await["duplicate"], false);

    let second = send(
        &h.app,
        signed_post("/api/webhooks/payments", PAYMENT_SECRET, &payment_body("evt_2")),
    )
    .await;
    assert_eq!(second.status(), StatusCode::OK);
    let ack = response_json(second).await;
    assert_eq!(ack["received"], true);
    assert_eq!(ack["duplicate"], true);

    // The side effect ran exactly once.
    assert_eq!(h.audit.entries().len(), 1);
}

#[tokio::test]
async fn distinct_event_ids_are_processed_independently() {
    let h = harness(EngineBehavior::Reply("{}"));

    for id in ["evt_3", "evt_4"] {
        let response = send(
            &h.app,
            signed_post("/api/webhooks/payments", PAYMENT_SECRET, &payment_body(id)),
        )
        .await;
        assert_eq!(response_json(response).await["duplicate"], false);
    }

    assert_eq!(h.audit.entries().len(), 2);
}

#[tokio::test]
async fn bad_signature_claims_nothing() {
    let h = harness(EngineBehavior::Reply("{}"));

    let response = send(
        &h.app,
        signed_post("/api/webhooks/payments", CHAT_SECRET, &payment_body("evt_5")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(h.event_store.find("evt_5").await.unwrap().is_none());
    assert!(h.audit.entries().is_empty());
}
