use chrono::Utc;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::database::event_store::{ClaimOutcome, WebhookEventStore};
use crate::error::Result;
use crate::models::webhook_event::WebhookEvent;

/// Simpler single-writer idempotency ledger for third-party webhook events
/// keyed by a globally unique event id. Claim-before-process is mandatory:
/// the side effect must never run before the claim succeeds.
#[derive(Clone)]
pub struct EventIdempotencyLedger {
    store: Arc<dyn WebhookEventStore>,
}

impl EventIdempotencyLedger {
    pub fn new(store: Arc<dyn WebhookEventStore>) -> Self {
        Self { store }
    }

    /// Returns `true` when another delivery already claimed this event, in
    /// which case the caller acknowledges without reprocessing.
    pub async fn claim(
        &self,
        event_id: &str,
        event_type: &str,
        tenant_id: Option<Uuid>,
        payload: &JsonValue,
    ) -> Result<bool> {
        let event = WebhookEvent {
            event_id: event_id.to_string(),
            event_type: event_type.to_string(),
            tenant_id,
            processed: false,
            payload: payload.clone(),
            created_at: Utc::now(),
            processed_at: None,
        };
        match self.store.claim(&event).await? {
            ClaimOutcome::Claimed => Ok(false),
            ClaimOutcome::AlreadyClaimed => {
                debug!(event_id, "duplicate webhook delivery, already claimed");
                Ok(true)
            }
        }
    }

    pub async fn mark_processed(&self, event_id: &str) -> Result<()> {
        self.store.mark_processed(event_id, Utc::now()).await
    }

    pub async fn find(&self, event_id: &str) -> Result<Option<WebhookEvent>> {
        self.store.find(event_id).await
    }
}
