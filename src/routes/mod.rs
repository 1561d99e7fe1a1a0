pub mod chat;
pub mod engine;
pub mod health;
pub mod payments;
pub mod runs;
pub mod voice;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::{Error, Result};
use crate::utils::signature::SignatureGate;
use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/webhooks/chat", post(chat::intake_chat_event))
        .route("/api/webhooks/voice/events", post(voice::intake_call_event))
        .route("/api/webhooks/voice/intent", post(voice::handle_call_intent))
        .route(
            "/api/webhooks/voice/connect/:provider",
            post(voice::build_call_connect),
        )
        .route("/api/webhooks/engine/reply", post(engine::handle_engine_reply))
        .route("/api/webhooks/payments", post(payments::handle_payment_event))
        .route("/api/runs/:id", get(runs::get_run))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
}

/// Checks the boundary signature before anything else touches the payload.
/// Rejections happen with zero ledger writes.
pub(crate) fn verify_boundary(
    gate: &SignatureGate,
    headers: &HeaderMap,
    raw_body: &str,
) -> Result<()> {
    let signature = headers
        .get("x-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::Unauthorized("missing_signature".to_string()))?;
    let timestamp: i64 = headers
        .get("x-timestamp")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| Error::Unauthorized("missing_or_invalid_timestamp".to_string()))?;

    gate.verify(raw_body, signature, timestamp)
        .map_err(|e| Error::Unauthorized(e.reason().to_string()))
}
