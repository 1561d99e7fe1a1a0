use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::Result;
use crate::models::tenant::TenantWorkflowConfig;

/// Narrow read-side interface onto tenant management, which lives outside
/// this subsystem. Only the two lookups the ingestion path needs.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Maps an inbound recipient phone/contact id to the owning tenant.
    async fn resolve_by_phone(&self, phone: &str) -> Result<Option<Uuid>>;

    async fn workflow_config(&self, tenant_id: Uuid) -> Result<Option<TenantWorkflowConfig>>;
}

#[derive(Clone)]
pub struct PgTenantDirectory {
    pool: PgPool,
}

impl PgTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantDirectory for PgTenantDirectory {
    async fn resolve_by_phone(&self, phone: &str) -> Result<Option<Uuid>> {
        let row = sqlx::query(
            "SELECT tenant_id FROM tenant_workflow_settings WHERE registered_phone = $1",
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| Ok(r.try_get("tenant_id")?)).transpose()
    }

    async fn workflow_config(&self, tenant_id: Uuid) -> Result<Option<TenantWorkflowConfig>> {
        let row = sqlx::query(
            "SELECT tenant_id, workflow_base_url, workflow_id, max_retries, timeout_seconds \
             FROM tenant_workflow_settings WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            let timeout_seconds: i64 = r.try_get("timeout_seconds")?;
            Ok(TenantWorkflowConfig {
                tenant_id: r.try_get("tenant_id")?,
                workflow_base_url: r.try_get("workflow_base_url")?,
                workflow_id: r.try_get("workflow_id")?,
                max_retries: r.try_get("max_retries")?,
                timeout_seconds: timeout_seconds.max(1) as u64,
            })
        })
        .transpose()
    }
}

/// In-memory directory for tests and embedding; built once, read-only after.
#[derive(Default)]
pub struct MemoryTenantDirectory {
    by_phone: HashMap<String, Uuid>,
    configs: HashMap<Uuid, TenantWorkflowConfig>,
}

impl MemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant(mut self, phone: &str, config: TenantWorkflowConfig) -> Self {
        self.by_phone.insert(phone.to_string(), config.tenant_id);
        self.configs.insert(config.tenant_id, config);
        self
    }
}

#[async_trait]
impl TenantDirectory for MemoryTenantDirectory {
    async fn resolve_by_phone(&self, phone: &str) -> Result<Option<Uuid>> {
        Ok(self.by_phone.get(phone).copied())
    }

    async fn workflow_config(&self, tenant_id: Uuid) -> Result<Option<TenantWorkflowConfig>> {
        Ok(self.configs.get(&tenant_id).cloned())
    }
}
