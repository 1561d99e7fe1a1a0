use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// One row per third-party delivery, keyed by the provider's globally unique
/// event id. `processed` flips false -> true exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event_id: String,
    pub event_type: String,
    pub tenant_id: Option<Uuid>,
    pub processed: bool,
    pub payload: JsonValue,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}
