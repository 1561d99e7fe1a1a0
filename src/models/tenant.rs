use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-tenant dispatch settings, resolved through the tenant directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantWorkflowConfig {
    pub tenant_id: Uuid,
    pub workflow_base_url: String,
    pub workflow_id: String,
    /// Total dispatch attempts allowed per run.
    pub max_retries: i32,
    /// Per-attempt timeout for the outbound call.
    pub timeout_seconds: u64,
}

impl TenantWorkflowConfig {
    pub fn endpoint_url(&self) -> String {
        format!(
            "{}/{}",
            self.workflow_base_url.trim_end_matches('/'),
            self.workflow_id
        )
    }
}
