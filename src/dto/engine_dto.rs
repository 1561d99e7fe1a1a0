use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Reply pushed back by the workflow engine, keyed by the sender address the
/// original event came from (the tenant comes from the callback token).
#[derive(Debug, Deserialize, Validate)]
pub struct EngineReplyRequest {
    #[validate(length(min = 1))]
    pub to: String,
    #[validate(length(min = 1))]
    pub reply_text: String,
    pub correlation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EngineReplyResponse {
    pub ok: bool,
    pub matched: bool,
    pub run_id: Option<Uuid>,
}
