use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use serde_json::Value as JsonValue;
use validator::Validate;

use crate::dto::chat_dto::{ChatEventRequest, IntakeAck};
use crate::error::{Error, Result};
use crate::models::automation_run::{Channel, InboundEvent};
use crate::routes::verify_boundary;
use crate::services::correlation_service::{CorrelationOutcome, ExecutionMode};
use crate::AppState;

/// Chat-channel event intake. Completes asynchronously: the delivery is
/// acknowledged as soon as the run is in the ledger.
#[utoipa::path(
    post,
    path = "/api/webhooks/chat",
    responses(
        (status = 202, description = "Event accepted, dispatch running in the background"),
        (status = 200, description = "Duplicate delivery, existing run returned"),
        (status = 401, description = "Signature verification failed"),
        (status = 404, description = "No tenant registered for the recipient"),
    ),
)]
pub async fn intake_chat_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<(StatusCode, Json<IntakeAck>)> {
    verify_boundary(&state.gates.chat, &headers, &body)?;

    let req: ChatEventRequest = serde_json::from_str(&body)?;
    req.validate()?;

    let tenant_id = state
        .directory
        .resolve_by_phone(&req.to)
        .await?
        .ok_or_else(|| Error::NotFound("unknown_tenant".to_string()))?;
    state
        .rate_limiter
        .check(&tenant_id.to_string(), "chat_intake")
        .await?;

    let event = InboundEvent {
        tenant_id,
        channel: req.channel.unwrap_or(Channel::Whatsapp),
        event_type: "message.received".to_string(),
        from_address: req.from,
        to_address: req.to,
        external_message_id: req.external_message_id,
        correlation_id: req.correlation_id,
        text: req.text,
        metadata: req.metadata.unwrap_or(JsonValue::Null),
    };

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
