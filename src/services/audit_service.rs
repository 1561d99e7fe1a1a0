use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::Result;

/// Write-side interface to the audit trail and usage counters, both owned by
/// collaborators outside this subsystem.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, tenant_id: Option<Uuid>, action: &str, detail: &JsonValue)
        -> Result<()>;
}

#[derive(Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(
        &self,
        tenant_id: Option<Uuid>,
        action: &str,
        detail: &JsonValue,
    ) -> Result<()> {
        sqlx::query("INSERT INTO audit_logs (tenant_id, action, detail) VALUES ($1, $2, $3)")
            .bind(tenant_id)
            .bind(action)
            .bind(detail)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub tenant_id: Option<Uuid>,
    pub action: String,
    pub detail: JsonValue,
}

#[derive(Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit sink poisoned").clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(
        &self,
        tenant_id: Option<Uuid>,
        action: &str,
        detail: &JsonValue,
    ) -> Result<()> {
        self.entries
            .lock()
            .expect("audit sink poisoned")
            .push(AuditEntry {
                tenant_id,
                action: action.to_string(),
                detail: detail.clone(),
            });
        Ok(())
    }
}
