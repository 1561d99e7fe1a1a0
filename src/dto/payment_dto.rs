use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct PaymentEventRequest {
    /// Provider-assigned globally unique event id; the idempotency key.
    #[validate(length(min = 1))]
    pub id: String,
    #[serde(rename = "type")]
    #[validate(length(min = 1))]
    pub event_type: String,
    pub tenant_id: Option<Uuid>,
    #[serde(default)]
    pub data: JsonValue,
}

#[derive(Debug, Serialize)]
pub struct PaymentAck {
    pub received: bool,
    pub duplicate: bool,
}
