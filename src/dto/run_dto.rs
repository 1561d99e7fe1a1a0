use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::models::automation_run::{AutomationRun, Channel, RunStatus};

/// Caller-facing view of a run, used to inspect an async correlation handle.
#[derive(Debug, Serialize)]
pub struct RunView {
    pub id: Uuid,
    pub channel: Channel,
    pub status: RunStatus,
    pub correlation_id: String,
    pub external_message_id: Option<String>,
    pub retry_count: i32,
    pub response_payload: Option<JsonValue>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

impl From<AutomationRun> for RunView {
    fn from(run: AutomationRun) -> Self {
        Self {
            id: run.id,
            channel: run.channel,
            status: run.status,
            correlation_id: run.correlation_id,
            external_message_id: run.external_message_id,
            retry_count: run.retry_count,
            response_payload: run.response_payload,
            last_error: run.last_error,
            created_at: run.created_at,
            completed_at: run.completed_at,
            duration_ms: run.duration_ms,
        }
    }
}
