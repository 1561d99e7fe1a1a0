use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::automation_run::{AutomationRun, Channel, RunStatus};

/// Result of an optimistic ledger insert. `Conflict` means another delivery
/// won the uniqueness race; callers re-read instead of surfacing an error.
#[derive(Debug)]
pub enum InsertOutcome {
    Inserted(AutomationRun),
    Conflict,
}

/// Storage seam for the run ledger. All cross-request coordination happens
/// here through the uniqueness constraint on (tenant_id, external_message_id),
/// never through application-level locks.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn find_by_dedup_key(
        &self,
        tenant_id: Uuid,
        external_message_id: &str,
    ) -> Result<Option<AutomationRun>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AutomationRun>>;

    /// Newest non-terminal run for a sender, used to correlate delayed engine
    /// replies back to their originating event.
    async fn find_open_by_sender(
        &self,
        tenant_id: Uuid,
        from_address: &str,
    ) -> Result<Option<AutomationRun>>;

    async fn insert(&self, run: AutomationRun) -> Result<InsertOutcome>;

    async fn mark_dispatched(&self, id: Uuid, started_at: DateTime<Utc>) -> Result<()>;

    async fn record_retry(&self, id: Uuid, retry_count: i32, last_error: &str) -> Result<()>;

    async fn record_success(
        &self,
        id: Uuid,
        response: &JsonValue,
        completed_at: DateTime<Utc>,
        duration_ms: i64,
    ) -> Result<()>;

    async fn record_failure(
        &self,
        id: Uuid,
        last_error: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<()>;
}

#[derive(Clone)]
pub struct PgRunStore {
    pool: PgPool,
}

impl PgRunStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const RUN_COLUMNS: &str = "id, tenant_id, channel, from_address, to_address, external_message_id, \
     correlation_id, status, request_payload, response_payload, last_error, retry_count, \
     created_at, started_at, completed_at, duration_ms";

fn run_from_row(row: &PgRow) -> Result<AutomationRun> {
    let channel: String = row.try_get("channel")?;
    let status: String = row.try_get("status")?;
    Ok(AutomationRun {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        channel: channel.parse::<Channel>().map_err(Error::Internal)?,
        from_address: row.try_get("from_address")?,
        to_address: row.try_get("to_address")?,
        external_message_id: row.try_get("external_message_id")?,
        correlation_id: row.try_get("correlation_id")?,
        status: status.parse::<RunStatus>().map_err(Error::Internal)?,
        request_payload: row.try_get("request_payload")?,
        response_payload: row.try_get("response_payload")?,
        last_error: row.try_get("last_error")?,
        retry_count: row.try_get("retry_count")?,
        created_at: row.try_get("created_at")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        duration_ms: row.try_get("duration_ms")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db)
            if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation)
    )
}

#[async_trait]
impl RunStore for PgRunStore {
    async fn find_by_dedup_key(
        &self,
        tenant_id: Uuid,
        external_message_id: &str,
    ) -> Result<Option<AutomationRun>> {
        let sql = format!(
            "SELECT {RUN_COLUMNS} FROM automation_runs \
             WHERE tenant_id = $1 AND external_message_id = $2"
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(external_message_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(run_from_row).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AutomationRun>> {
        let sql = format!("SELECT {RUN_COLUMNS} FROM automation_runs WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(run_from_row).transpose()
    }

    async fn find_open_by_sender(
        &self,
        tenant_id: Uuid,
        from_address: &str,
    ) -> Result<Option<AutomationRun>> {
        let sql = format!(
            "SELECT {RUN_COLUMNS} FROM automation_runs \
             WHERE tenant_id = $1 AND from_address = $2 AND status IN ('received', 'dispatched') \
             ORDER BY created_at DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(from_address)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(run_from_row).transpose()
    }

    async fn insert(&self, run: AutomationRun) -> Result<InsertOutcome> {
        let res = sqlx::query(
            "INSERT INTO automation_runs \
             (id, tenant_id, channel, from_address, to_address, external_message_id, \
              correlation_id, status, request_payload, retry_count, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(run.id)
        .bind(run.tenant_id)
        .bind(run.channel.as_str())
        .bind(&run.from_address)
        .bind(&run.to_address)
        .bind(&run.external_message_id)
        .bind(&run.correlation_id)
        .bind(run.status.as_str())
        .bind(&run.request_payload)
        .bind(run.retry_count)
        .bind(run.created_at)
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => Ok(InsertOutcome::Inserted(run)),
            Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::Conflict),
            Err(e) => Err(e.into()),
        }
    }

    async fn mark_dispatched(&self, id: Uuid, started_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE automation_runs SET status = 'dispatched', started_at = $1 WHERE id = $2",
        )
        .bind(started_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_retry(&self, id: Uuid, retry_count: i32, last_error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE automation_runs SET retry_count = $1, last_error = $2 WHERE id = $3",
        )
        .bind(retry_count)
        .bind(last_error)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_success(
        &self,
        id: Uuid,
        response: &JsonValue,
        completed_at: DateTime<Utc>,
        duration_ms: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE automation_runs SET status = 'success', response_payload = $1, \
             completed_at = $2, duration_ms = $3 WHERE id = $4",
        )
        .bind(response)
        .bind(completed_at)
        .bind(duration_ms)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_failure(
        &self,
        id: Uuid,
        last_error: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE automation_runs SET status = 'failed', last_error = $1, completed_at = $2 \
             WHERE id = $3",
        )
        .bind(last_error)
        .bind(completed_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
