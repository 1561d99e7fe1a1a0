use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use uuid::Uuid;

use crate::dto::run_dto::RunView;
use crate::error::{Error, Result};
use crate::utils::callback_token::bearer_token;
use crate::AppState;

/// Inspect a run by its correlation handle. Scoped by the callback token's
/// tenant claim; runs belonging to other tenants are indistinguishable from
/// missing ones.
#[utoipa::path(
    get,
    path = "/api/runs/{id}",
    params(("id" = Uuid, Path, description = "Run id returned by an intake endpoint")),
    responses(
        (status = 200, description = "Run state"),
        (status = 401, description = "Missing or invalid callback token"),
        (status = 404, description = "No such run for this tenant"),
    ),
)]
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<RunView>> {
    let auth = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::Unauthorized("missing_authorization".to_string()))?;
    let token = bearer_token(auth)
        .ok_or_else(|| Error::Unauthorized("unsupported_scheme".to_string()))?;
    let tenant_id = state.tokens.verify(token)?;

    let run = state
        .run_ledger
        .find(id)
        .await?
        .filter(|r| r.tenant_id == tenant_id)
        .ok_or_else(|| Error::NotFound("run_not_found".to_string()))?;

    Ok(Json(RunView::from(run)))
}
