use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value as JsonValue};
use validator::Validate;

use crate::dto::chat_dto::IntakeAck;
use crate::dto::voice_dto::{VoiceEventRequest, VoiceIntentResponse};
use crate::error::{Error, Result};
use crate::models::automation_run::{Channel, InboundEvent};
use crate::routes::verify_boundary;
use crate::services::correlation_service::{CorrelationOutcome, ExecutionMode};
use crate::services::telephony::CallConnectRequest;
use crate::AppState;

fn voice_event(tenant_id: uuid::Uuid, event_type: &str, req: VoiceEventRequest) -> InboundEvent {
    InboundEvent {
        tenant_id,
        channel: Channel::Call,
        event_type: event_type.to_string(),
        from_address: req.from,
        to_address: req.to,
        external_message_id: req.external_message_id,
        correlation_id: req.correlation_id,
        text: req.text,
        metadata: json!({
            "call_id": req.call_id,
            "call": req.call_metadata,
        }),
    }
}

/// Telephony event intake, asynchronous variant.
pub async fn intake_call_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<(StatusCode, Json<IntakeAck>)> {
    verify_boundary(&state.gates.voice, &headers, &body)?;

    let req: VoiceEventRequest = serde_json::from_str(&body)?;
    req.validate()?;

    let tenant_id = state
        .directory
        .resolve_by_phone(&req.to)
        .await?
        .ok_or_else(|| Error::NotFound("unknown_tenant".to_string()))?;
    state
        .rate_limiter
        .check(&tenant_id.to_string(), "voice_event")
        .await?;

    let event = voice_event(tenant_id, "call.event", req);
    match state
        .correlator
        .execute_or_fetch(event, ExecutionMode::Background)
        .await?
    {
        CorrelationOutcome::Accepted { run_id } => Ok((
            StatusCode::ACCEPTED,
            Json(IntakeAck {
                accepted: true,
                run_id: Some(run_id),
                message: None,
            }),
        )),
        CorrelationOutcome::Duplicate { run_id, .. } => Ok((
            StatusCode::OK,
            Json(IntakeAck {
                accepted: true,
                run_id: Some(run_id),
                message: Some("duplicate_delivery".to_string()),
            }),
        )),
        _ => Err(Error::Internal(
            "unexpected correlation outcome for background mode".to_string(),
        )),
    }
}

/// Telephony intent, synchronous variant. Must answer within the calling
/// gateway's hard timeout and always carry a usable `response_text` — an
/// internal failure never fails the HTTP call itself.
#[utoipa::path(
    post,
    path = "/api/webhooks/voice/intent",
    responses(
        (status = 200, description = "Intent answered; response_text is always usable"),
        (status = 401, description = "Signature verification failed"),
        (status = 404, description = "No tenant registered for the called number"),
    ),
)]
pub async fn handle_call_intent(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<VoiceIntentResponse>> {
    verify_boundary(&state.gates.voice, &headers, &body)?;

    let req: VoiceEventRequest = serde_json::from_str(&body)?;
    req.validate()?;

    let tenant_id = state
        .directory
        .resolve_by_phone(&req.to)
        .await?
        .ok_or_else(|| Error::NotFound("unknown_tenant".to_string()))?;
    state
        .rate_limiter
        .check(&tenant_id.to_string(), "voice_intent")
        .await?;

    let event = voice_event(tenant_id, "call.intent", req);
    let outcome = state
        .correlator
        .execute_or_fetch(event, ExecutionMode::Blocking(state.sync_reply_budget))
        .await?;

    let (run_id, response) = match outcome {
        CorrelationOutcome::Completed { run_id, response } => (Some(run_id), Some(response)),
        // A replayed intent must not re-trigger a billable workflow
        // execution or a second voice reply; answer from the ledger.
        CorrelationOutcome::Duplicate {
            run_id, response, ..
        } => (Some(run_id), response),
        CorrelationOutcome::TimedOut { run_id } | CorrelationOutcome::Failed { run_id } => {
            (Some(run_id), None)
        }
        CorrelationOutcome::Accepted { run_id } => (Some(run_id), None),
    };

    let (response_text, end_call) = match response.as_ref() {
        Some(payload) => reply_from_payload(payload, &state.voice_fallback_text),
        None => (state.voice_fallback_text.clone(), false),
    };

    Ok(Json(VoiceIntentResponse {
        ok: true,
        run_id,
        response_text,
        end_call,
    }))
}

/// Vendor-specific call-connect document, built by the provider adapter the
/// path names. Adding a vendor means adding an adapter, not a branch here.
pub async fn build_call_connect(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<JsonValue>> {
    verify_boundary(&state.gates.voice, &headers, &body)?;

    let req: CallConnectRequest = serde_json::from_str(&body)?;
    req.validate()?;

    let adapter = state
        .providers
        .get(provider.as_str())
        .ok_or_else(|| Error::NotFound(format!("unknown_provider: {}", provider)))?;
    Ok(Json(adapter.connect_response(&req)))
}

fn reply_from_payload(payload: &JsonValue, fallback: &str) -> (String, bool) {
    let text = payload
        .get("response_text")
        .and_then(|v| v.as_str())
        .or_else(|| payload.get("message").and_then(|v| v.as_str()))
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback)
        .to_string();
    let end_call = payload
        .get("end_call")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    (text, end_call)
}
