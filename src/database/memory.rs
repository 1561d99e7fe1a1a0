//! In-memory store implementations. Used by the test suite and available for
//! embedding; they reproduce the uniqueness-constraint semantics of the
//! Postgres stores so ledger race behavior can be exercised without a
//! database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::database::event_store::{ClaimOutcome, WebhookEventStore};
use crate::database::run_store::{InsertOutcome, RunStore};
use crate::error::Result;
use crate::models::automation_run::{AutomationRun, RunStatus};
use crate::models::webhook_event::WebhookEvent;

#[derive(Default)]
pub struct MemoryRunStore {
    runs: Mutex<Vec<AutomationRun>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.runs.lock().expect("run store poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn find_by_dedup_key(
        &self,
        tenant_id: Uuid,
        external_message_id: &str,
    ) -> Result<Option<AutomationRun>> {
        let runs = self.runs.lock().expect("run store poisoned");
        Ok(runs
            .iter()
            .find(|r| {
                r.tenant_id == tenant_id
                    && r.external_message_id.as_deref() == Some(external_message_id)
            })
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AutomationRun>> {
        let runs = self.runs.lock().expect("run store poisoned");
        Ok(runs.iter().find(|r| r.id == id).cloned())
    }

    async fn find_open_by_sender(
        &self,
        tenant_id: Uuid,
        from_address: &str,
    ) -> Result<Option<AutomationRun>> {
        let runs = self.runs.lock().expect("run store poisoned");
        Ok(runs
            .iter()
            .filter(|r| {
                r.tenant_id == tenant_id
                    && r.from_address == from_address
                    && !r.status.is_terminal()
            })
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn insert(&self, run: AutomationRun) -> Result<InsertOutcome> {
        let mut runs = self.runs.lock().expect("run store poisoned");
        if let Some(key) = run.external_message_id.as_deref() {
            let clash = runs.iter().any(|r| {
                r.tenant_id == run.tenant_id && r.external_message_id.as_deref() == Some(key)
            });
            if clash {
                return Ok(InsertOutcome::Conflict);
            }
        }
        runs.push(run.clone());
        Ok(InsertOutcome::Inserted(run))
    }

    async fn mark_dispatched(&self, id: Uuid, started_at: DateTime<Utc>) -> Result<()> {
        let mut runs = self.runs.lock().expect("run store poisoned");
        if let Some(run) = runs.iter_mut().find(|r| r.id == id) {
            run.status = RunStatus::Dispatched;
            run.started_at = Some(started_at);
        }
        Ok(())
    }

    async fn record_retry(&self, id: Uuid, retry_count: i32, last_error: &str) -> Result<()> {
        let mut runs = self.runs.lock().expect("run store poisoned");
        if let Some(run) = runs.iter_mut().find(|r| r.id == id) {
            run.retry_count = retry_count;
            run.last_error = Some(last_error.to_string());
        }
        Ok(())
    }

    async fn record_success(
        &self,
        id: Uuid,
        response: &JsonValue,
        completed_at: DateTime<Utc>,
        duration_ms: i64,
    ) -> Result<()> {
        let mut runs = self.runs.lock().expect("run store poisoned");
        if let Some(run) = runs.iter_mut().find(|r| r.id == id) {
            run.status = RunStatus::Success;
            run.response_payload = Some(response.clone());
            run.completed_at = Some(completed_at);
            run.duration_ms = Some(duration_ms);
        }
        Ok(())
    }

    async fn record_failure(
        &self,
        id: Uuid,
        last_error: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut runs = self.runs.lock().expect("run store poisoned");
        if let Some(run) = runs.iter_mut().find(|r| r.id == id) {
            run.status = RunStatus::Failed;
            run.last_error = Some(last_error.to_string());
            run.completed_at = Some(completed_at);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryWebhookEventStore {
    events: Mutex<HashMap<String, WebhookEvent>>,
}

impl MemoryWebhookEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WebhookEventStore for MemoryWebhookEventStore {
    async fn claim(&self, event: &WebhookEvent) -> Result<ClaimOutcome> {
        let mut events = self.events.lock().expect("event store poisoned");
        if events.contains_key(&event.event_id) {
            return Ok(ClaimOutcome::AlreadyClaimed);
        }
        events.insert(event.event_id.clone(), event.clone());
        Ok(ClaimOutcome::Claimed)
    }

    async fn mark_processed(&self, event_id: &str, processed_at: DateTime<Utc>) -> Result<()> {
        let mut events = self.events.lock().expect("event store poisoned");
        if let Some(event) = events.get_mut(event_id) {
            if !event.processed {
                event.processed = true;
                event.processed_at = Some(processed_at);
            }
        }
        Ok(())
    }

    async fn find(&self, event_id: &str) -> Result<Option<WebhookEvent>> {
        let events = self.events.lock().expect("event store poisoned");
        Ok(events.get(event_id).cloned())
    }
}
