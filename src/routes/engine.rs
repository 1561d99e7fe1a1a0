use axum::{extract::State, http::HeaderMap, Json};
use serde_json::json;
use tracing::warn;
use validator::Validate;

use crate::dto::engine_dto::{EngineReplyRequest, EngineReplyResponse};
use crate::error::{Error, Result};
use crate::utils::callback_token::bearer_token;
use crate::AppState;

/// Delayed reply pushed by the workflow engine, authenticated with the
/// short-lived callback token it received inside the dispatched event. The
/// reply is correlated to the newest open run for (tenant, sender).
pub async fn handle_engine_reply(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<EngineReplyResponse>> {
    let auth = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::Unauthorized("missing_authorization".to_string()))?;
    let token = bearer_token(auth)
        .ok_or_else(|| Error::Unauthorized("unsupported_scheme".to_string()))?;
    let tenant_id = state.tokens.verify(token)?;

    let req: EngineReplyRequest = serde_json::from_str(&body)?;
    req.validate()?;

    match state
        .run_ledger
        .find_open_by_sender(tenant_id, &req.to)
        .await?
    {
        Some(run) => {
            let payload = json!({
                "response_text": req.reply_text,
                "correlation_id": req.correlation_id,
            });
            state.run_ledger.record_reply(&run, &payload).await?;
            state
                .audit
                .record(Some(tenant_id), "engine_reply_correlated", &payload)
                .await?;
            Ok(Json(EngineReplyResponse {
                ok: true,
                matched: true,
                run_id: Some(run.id),
            }))
        }
        None => {
            warn!(tenant_id = %tenant_id, to = %req.to, "engine reply matched no open run");
            Ok(Json(EngineReplyResponse {
                ok: true,
                matched: false,
                run_id: None,
            }))
        }
    }
}
