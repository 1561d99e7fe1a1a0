use axum::{extract::State, http::HeaderMap, Json};
use serde_json::json;
use validator::Validate;

use crate::dto::payment_dto::{PaymentAck, PaymentEventRequest};
use crate::error::Result;
use crate::routes::verify_boundary;
use crate::AppState;

/// Payment-provider webhook. Claim-before-process: the event id is claimed in
/// the idempotency ledger first, so concurrent redeliveries can never run the
/// side effect twice.
#[utoipa::path(
    post,
    path = "/api/webhooks/payments",
    responses(
        (status = 200, description = "Event acknowledged; duplicate flag set on redelivery"),
        (status = 401, description = "Signature verification failed"),
    ),
)]
pub async fn handle_payment_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<PaymentAck>> {
    verify_boundary(&state.gates.payment, &headers, &body)?;

    let req: PaymentEventRequest = serde_json::from_str(&body)?;
    req.validate()?;

    let already_claimed = state
        .event_ledger
        .claim(&req.id, &req.event_type, req.tenant_id, &req.data)
        .await?;
    if already_claimed {
        return Ok(Json(PaymentAck {
            received: true,
            duplicate: true,
        }));
    }

    state
        .audit
        .record(
            req.tenant_id,
            "payment_event_processed",
            &json!({ "event_id": req.id, "type": req.event_type }),
        )
        .await?;
    state.event_ledger.mark_processed(&req.id).await?;

    Ok(Json(PaymentAck {
        received: true,
        duplicate: false,
    }))
}
