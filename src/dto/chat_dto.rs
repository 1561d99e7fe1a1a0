use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

use crate::models::automation_run::Channel;

#[derive(Debug, Deserialize, Validate)]
pub struct ChatEventRequest {
    #[validate(length(min = 1))]
    pub from: String,
    /// Recipient phone/contact id; resolves the owning tenant.
    #[validate(length(min = 1))]
    pub to: String,
    pub external_message_id: Option<String>,
    pub correlation_id: Option<String>,
    pub text: Option<String>,
    pub channel: Option<Channel>,
    pub metadata: Option<JsonValue>,
}

/// Shared acceptance acknowledgment for the asynchronous intake endpoints.
#[derive(Debug, Serialize)]
pub struct IntakeAck {
    pub accepted: bool,
    pub run_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
