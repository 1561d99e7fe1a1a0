use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct VoiceEventRequest {
    #[validate(length(min = 1))]
    pub call_id: String,
    #[validate(length(min = 1))]
    pub from: String,
    #[validate(length(min = 1))]
    pub to: String,
    pub external_message_id: Option<String>,
    pub correlation_id: Option<String>,
    /// Transcribed caller utterance for intent calls.
    pub text: Option<String>,
    pub call_metadata: Option<JsonValue>,
}

/// The gateway always needs something it can speak, even when automation is
/// down. `response_text` is never empty.
#[derive(Debug, Serialize)]
pub struct VoiceIntentResponse {
    pub ok: bool,
    pub run_id: Option<Uuid>,
    pub response_text: String,
    pub end_call: bool,
}
