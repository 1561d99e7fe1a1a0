use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Inbound source of an event. Stored as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Whatsapp,
    Call,
    Widget,
    Sms,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Whatsapp => "whatsapp",
            Channel::Call => "call",
            Channel::Widget => "widget",
            Channel::Sms => "sms",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "whatsapp" => Ok(Channel::Whatsapp),
            "call" => Ok(Channel::Call),
            "widget" => Ok(Channel::Widget),
            "sms" => Ok(Channel::Sms),
            other => Err(format!("unknown channel: {}", other)),
        }
    }
}

/// Run lifecycle: `received -> dispatched -> {success | failed}`. A run that
/// reached a terminal state never re-enters the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Received,
    Dispatched,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Received => "received",
            RunStatus::Dispatched => "dispatched",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(RunStatus::Received),
            "dispatched" => Ok(RunStatus::Dispatched),
            "success" => Ok(RunStatus::Success),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status: {}", other)),
        }
    }
}

/// One ledger row per distinct (tenant, external_message_id) when the
/// external id exists. Never deleted; mutated only by the dispatch attempt
/// that created it (or by the engine's delayed reply).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationRun {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub channel: Channel,
    pub from_address: String,
    pub to_address: String,
    pub external_message_id: Option<String>,
    pub correlation_id: String,
    pub status: RunStatus,
    pub request_payload: JsonValue,
    pub response_payload: Option<JsonValue>,
    pub last_error: Option<String>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

/// Normalized inbound event, shared by every intake route. Serialized as the
/// run's `request_payload`, so a dispatch can be rebuilt from the ledger row
/// alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub tenant_id: Uuid,
    pub channel: Channel,
    pub event_type: String,
    pub from_address: String,
    pub to_address: String,
    pub external_message_id: Option<String>,
    pub correlation_id: Option<String>,
    pub text: Option<String>,
    #[serde(default)]
    pub metadata: JsonValue,
}

impl InboundEvent {
    /// Empty-string dedup keys carry no information; treat them as absent.
    pub fn dedup_key(&self) -> Option<&str> {
        self.external_message_id
            .as_deref()
            .filter(|s| !s.is_empty())
    }
}
