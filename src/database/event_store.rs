use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::error::Result;
use crate::models::webhook_event::WebhookEvent;

#[derive(Debug, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    AlreadyClaimed,
}

/// Single-writer idempotency table for third-party webhook deliveries. The
/// primary key on `event_id` arbitrates concurrent claims.
#[async_trait]
pub trait WebhookEventStore: Send + Sync {
    async fn claim(&self, event: &WebhookEvent) -> Result<ClaimOutcome>;

    async fn mark_processed(&self, event_id: &str, processed_at: DateTime<Utc>) -> Result<()>;

    async fn find(&self, event_id: &str) -> Result<Option<WebhookEvent>>;
}

#[derive(Clone)]
pub struct PgWebhookEventStore {
    pool: PgPool,
}

impl PgWebhookEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhookEventStore for PgWebhookEventStore {
    async fn claim(&self, event: &WebhookEvent) -> Result<ClaimOutcome> {
        let res = sqlx::query(
            "INSERT INTO webhook_events (event_id, event_type, tenant_id, processed, payload, created_at) \
             VALUES ($1, $2, $3, FALSE, $4, $5)",
        )
        .bind(&event.event_id)
        .bind(&event.event_type)
        .bind(event.tenant_id)
        .bind(&event.payload)
        .bind(event.created_at)
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => Ok(ClaimOutcome::Claimed),
            Err(sqlx::Error::Database(db))
                if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
            {
                Ok(ClaimOutcome::AlreadyClaimed)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn mark_processed(&self, event_id: &str, processed_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE webhook_events SET processed = TRUE, processed_at = $1 \
             WHERE event_id = $2 AND processed = FALSE",
        )
        .bind(processed_at)
        .bind(event_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, event_id: &str) -> Result<Option<WebhookEvent>> {
        let row = sqlx::query(
            "SELECT event_id, event_type, tenant_id, processed, payload, created_at, processed_at \
             FROM webhook_events WHERE event_id = $1",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(WebhookEvent {
                event_id: r.try_get("event_id")?,
                event_type: r.try_get("event_type")?,
                tenant_id: r.try_get("tenant_id")?,
                processed: r.try_get("processed")?,
                payload: r.try_get("payload")?,
                created_at: r.try_get("created_at")?,
                processed_at: r.try_get("processed_at")?,
            })
        })
        .transpose()
    }
}
