use chrono::Utc;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::database::run_store::{InsertOutcome, RunStore};
use crate::error::{Error, Result};
use crate::models::automation_run::{AutomationRun, InboundEvent, RunStatus};

/// Idempotent creation/lookup of automation runs. The core correctness
/// primitive: for a given (tenant, external_message_id) exactly one insert
/// ever succeeds, and every other delivery observes the winning row.
#[derive(Clone)]
pub struct RunLedger {
    store: Arc<dyn RunStore>,
}

impl RunLedger {
    pub fn new(store: Arc<dyn RunStore>) -> Self {
        Self { store }
    }

    /// Returns the run for this event plus whether this call created it.
    ///
    /// Lookup first (pure read, what makes replays safe), then optimistic
    /// insert. A uniqueness conflict means another delivery raced us, so we
    /// re-read and hand back the winner instead of surfacing an error.
    pub async fn get_or_create(&self, event: &InboundEvent) -> Result<(AutomationRun, bool)> {
        if let Some(key) = event.dedup_key() {
            if let Some(existing) = self.store.find_by_dedup_key(event.tenant_id, key).await? {
                return Ok((existing, false));
            }

            match self.store.insert(self.build_run(event)).await? {
                InsertOutcome::Inserted(run) => Ok((run, true)),
                InsertOutcome::Conflict => {
                    let existing = self
                        .store
                        .find_by_dedup_key(event.tenant_id, key)
                        .await?
                        .ok_or_else(|| {
                            Error::Internal("conflicting run vanished after insert race".into())
                        })?;
                    Ok((existing, false))
                }
            }
        } else {
            // No external id, no dedup: every delivery creates a fresh row and
            // the caller forfeits the exactly-once guarantee for this event.
            warn!(
                tenant_id = %event.tenant_id,
                channel = %event.channel,
                "event arrived without external_message_id; replay protection disabled"
            );
            match self.store.insert(self.build_run(event)).await? {
                InsertOutcome::Inserted(run) => Ok((run, true)),
                InsertOutcome::Conflict => Err(Error::Internal(
                    "unexpected uniqueness conflict for keyless run".into(),
                )),
            }
        }
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<AutomationRun>> {
        self.store.find_by_id(id).await
    }

    pub async fn find_open_by_sender(
        &self,
        tenant_id: Uuid,
        from_address: &str,
    ) -> Result<Option<AutomationRun>> {
        self.store.find_open_by_sender(tenant_id, from_address).await
    }

    /// Completes a run with a delayed engine reply pushed through the
    /// callback channel.
    pub async fn record_reply(&self, run: &AutomationRun, payload: &JsonValue) -> Result<()> {
        let completed_at = Utc::now();
        let started = run.started_at.unwrap_or(run.created_at);
        let duration_ms = (completed_at - started).num_milliseconds();
        self.store
            .record_success(run.id, payload, completed_at, duration_ms)
            .await
    }

    fn build_run(&self, event: &InboundEvent) -> AutomationRun {
        AutomationRun {
            id: Uuid::new_v4(),
            tenant_id: event.tenant_id,
            channel: event.channel,
            from_address: event.from_address.clone(),
            to_address: event.to_address.clone(),
            external_message_id: event.dedup_key().map(str::to_string),
            correlation_id: event
                .correlation_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            status: RunStatus::Received,
            request_payload: serde_json::to_value(event).unwrap_or(JsonValue::Null),
            response_payload: None,
            last_error: None,
            retry_count: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            duration_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryRunStore;
    use crate::models::automation_run::Channel;

    fn event(external_id: Option<&str>, tenant_id: Uuid) -> InboundEvent {
        InboundEvent {
            tenant_id,
            channel: Channel::Whatsapp,
            event_type: "message.received".into(),
            from_address: "+15550001".into(),
            to_address: "+15559999".into(),
            external_message_id: external_id.map(str::to_string),
            correlation_id: None,
            text: Some("hello".into()),
            metadata: JsonValue::Null,
        }
    }

    #[tokio::test]
    async fn replay_returns_existing_row_unchanged() {
        let store = Arc::new(MemoryRunStore::new());
        let ledger = RunLedger::new(store.clone());
        let tenant = Uuid::new_v4();

        let (first, is_new) = ledger
            .get_or_create(&event(Some("wamid.abc"), tenant))
            .await
            .unwrap();
        assert!(is_new);

        let (second, is_new) = ledger
            .get_or_create(&event(Some("wamid.abc"), tenant))
            .await
            .unwrap();
        assert!(!is_new);
        assert_eq!(first.id, second.id);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_deliveries_create_exactly_one_row() {
        let ledger = RunLedger::new(Arc::new(MemoryRunStore::new()));
        let tenant = Uuid::new_v4();

        let event_a = event(Some("wamid.race"), tenant);
        let event_b = event(Some("wamid.race"), tenant);
        let (a, b) = tokio::join!(
            ledger.get_or_create(&event_a),
            ledger.get_or_create(&event_b),
        );
        let (run_a, new_a) = a.unwrap();
        let (run_b, new_b) = b.unwrap();

        assert_eq!(run_a.id, run_b.id);
        assert_eq!(u8::from(new_a) + u8::from(new_b), 1);
    }

    #[tokio::test]
    async fn same_external_id_different_tenants_are_distinct() {
        let store = Arc::new(MemoryRunStore::new());
        let ledger = RunLedger::new(store.clone());

        let (_, new_a) = ledger
            .get_or_create(&event(Some("wamid.abc"), Uuid::new_v4()))
            .await
            .unwrap();
        let (_, new_b) = ledger
            .get_or_create(&event(Some("wamid.abc"), Uuid::new_v4()))
            .await
            .unwrap();

        assert!(new_a && new_b);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn keyless_events_always_create_new_rows() {
        let store = Arc::new(MemoryRunStore::new());
        let ledger = RunLedger::new(store.clone());
        let tenant = Uuid::new_v4();

        let (_, new_a) = ledger.get_or_create(&event(None, tenant)).await.unwrap();
        let (_, new_b) = ledger.get_or_create(&event(None, tenant)).await.unwrap();
        // Empty string carries no information either.
        let (_, new_c) = ledger.get_or_create(&event(Some(""), tenant)).await.unwrap();

        assert!(new_a && new_b && new_c);
        assert_eq!(store.len(), 3);
    }
}
