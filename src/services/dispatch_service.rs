use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::run_store::RunStore;
use crate::models::automation_run::{AutomationRun, Channel, InboundEvent};
use crate::models::tenant::TenantWorkflowConfig;
use crate::utils::callback_token::CallbackTokenIssuer;
use crate::utils::signature::SignatureGate;

/// Classification of a dispatch failure. Absorbed internally; only the run's
/// persisted status crosses the HTTP boundary.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Network error, timeout or 5xx. Retried up to the tenant's budget.
    #[error("transient dispatch failure: {0}")]
    Transient(String),
    /// 4xx or malformed response. Terminal, never retried.
    #[error("dispatch rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone)]
pub struct EngineReply {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct TransportFailure {
    pub timed_out: bool,
    pub detail: String,
}

/// Wire seam to the workflow engine, mockable in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EngineTransport: Send + Sync {
    async fn post_event(
        &self,
        url: &str,
        timestamp: i64,
        signature: &str,
        body: String,
        timeout: Duration,
    ) -> std::result::Result<EngineReply, TransportFailure>;
}

pub struct HttpEngineTransport {
    client: reqwest::Client,
}

impl HttpEngineTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpEngineTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EngineTransport for HttpEngineTransport {
    async fn post_event(
        &self,
        url: &str,
        timestamp: i64,
        signature: &str,
        body: String,
        timeout: Duration,
    ) -> std::result::Result<EngineReply, TransportFailure> {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("X-Timestamp", timestamp.to_string())
            .header("X-Signature", signature)
            .body(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| TransportFailure {
                timed_out: e.is_timeout(),
                detail: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| TransportFailure {
            timed_out: e.is_timeout(),
            detail: e.to_string(),
        })?;
        Ok(EngineReply { status, body })
    }
}

/// Normalized event posted to `{workflow_base_url}/{workflow_id}`. The
/// callback token inside `metadata` lets the engine authenticate its reply.
#[derive(Debug, Serialize)]
struct OutboundEvent {
    tenant_id: Uuid,
    run_id: Uuid,
    channel: Channel,
    event_type: String,
    external_message_id: Option<String>,
    from_address: String,
    to_address: String,
    text: Option<String>,
    occurred_at: String,
    correlation_id: String,
    metadata: JsonValue,
}

/// Builds, signs and posts the normalized event, applying the per-tenant
/// retry policy and recording the outcome on the run.
pub struct DispatchClient {
    store: Arc<dyn RunStore>,
    transport: Arc<dyn EngineTransport>,
    signer: SignatureGate,
    tokens: CallbackTokenIssuer,
    backoff_base: Duration,
}

impl DispatchClient {
    pub fn new(
        store: Arc<dyn RunStore>,
        transport: Arc<dyn EngineTransport>,
        signer: SignatureGate,
        tokens: CallbackTokenIssuer,
        backoff_base: Duration,
    ) -> Self {
        Self {
            store,
            transport,
            signer,
            tokens,
            backoff_base,
        }
    }

    /// `received -> dispatched -> {success | failed}`. Only ever called for a
    /// freshly created run; duplicates are answered from the ledger and never
    /// reach this machine.
    pub async fn dispatch(
        &self,
        run: AutomationRun,
        cfg: TenantWorkflowConfig,
    ) -> std::result::Result<JsonValue, DispatchError> {
        let canonical = self.build_signed_body(&run)?;
        let url = cfg.endpoint_url();
        let timeout = Duration::from_secs(cfg.timeout_seconds);
        let attempts = cfg.max_retries.max(1);
        let started = Instant::now();

        self.store
            .mark_dispatched(run.id, Utc::now())
            .await
            .map_err(|e| DispatchError::Transient(e.to_string()))?;

        for attempt in 1..=attempts {
            let ts = Utc::now().timestamp();
            let signature = self.signer.sign(ts, &canonical);

            let detail = match self
                .transport
                .post_event(&url, ts, &signature, canonical.clone(), timeout)
                .await
            {
                Ok(reply) if (200..300).contains(&reply.status) => {
                    match serde_json::from_str::<JsonValue>(&reply.body) {
                        Ok(parsed) => {
                            let duration_ms = started.elapsed().as_millis() as i64;
                            self.store
                                .record_success(run.id, &parsed, Utc::now(), duration_ms)
                                .await
                                .map_err(|e| DispatchError::Transient(e.to_string()))?;
                            info!(run_id = %run.id, duration_ms, "dispatch succeeded");
                            return Ok(parsed);
                        }
                        Err(_) => {
                            return self
                                .fail(run.id, "malformed_response".to_string())
                                .await;
                        }
                    }
                }
                Ok(reply) if (400..500).contains(&reply.status) => {
                    return self
                        .fail(run.id, format!("engine rejected with status {}", reply.status))
                        .await;
                }
                Ok(reply) => format!("engine returned status {}", reply.status),
                Err(failure) if failure.timed_out => "request timed out".to_string(),
                Err(failure) => failure.detail,
            };

            // Transient failure: one retry_count increment per failed attempt,
            // clamped to the configured budget. A budget of zero still gets
            // its single mandatory attempt but records no retries.
            let counted = attempt.min(cfg.max_retries).max(0);
            self.store
                .record_retry(run.id, counted, &detail)
                .await
                .map_err(|e| DispatchError::Transient(e.to_string()))?;
            warn!(run_id = %run.id, attempt, %detail, "transient dispatch failure");

            if attempt == attempts {
                self.store
                    .record_failure(run.id, &detail, Utc::now())
                    .await
                    .map_err(|e| DispatchError::Transient(e.to_string()))?;
                return Err(DispatchError::Transient(detail));
            }

            tokio::time::sleep(self.backoff(attempt)).await;
        }

        Err(DispatchError::Transient("retry budget exhausted".into()))
    }

    fn backoff(&self, attempt: i32) -> Duration {
        let exp = (attempt - 1).clamp(0, 6) as u32;
        self.backoff_base * 2u32.pow(exp)
    }

    async fn fail(
        &self,
        run_id: Uuid,
        detail: String,
    ) -> std::result::Result<JsonValue, DispatchError> {
        self.store
            .record_failure(run_id, &detail, Utc::now())
            .await
            .map_err(|e| DispatchError::Transient(e.to_string()))?;
        warn!(run_id = %run_id, %detail, "dispatch rejected by engine");
        Err(DispatchError::Rejected(detail))
    }

    /// Rebuilds the normalized event from the ledger row and renders it in
    /// canonical (sorted-key) form ready for signing.
    fn build_signed_body(
        &self,
        run: &AutomationRun,
    ) -> std::result::Result<String, DispatchError> {
        let inbound: InboundEvent = serde_json::from_value(run.request_payload.clone())
            .map_err(|_| DispatchError::Rejected("corrupt_request_payload".into()))?;

        let token = self
            .tokens
            .mint(run.tenant_id)
            .map_err(|e| DispatchError::Rejected(e.to_string()))?;

        let mut metadata = match inbound.metadata {
            JsonValue::Object(map) => map,
            JsonValue::Null => serde_json::Map::new(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("source".into(), other);
                map
            }
        };
        metadata.insert("callback_token".into(), JsonValue::String(token));

        let event = OutboundEvent {
            tenant_id: run.tenant_id,
            run_id: run.id,
            channel: run.channel,
            event_type: inbound.event_type,
            external_message_id: run.external_message_id.clone(),
            from_address: run.from_address.clone(),
            to_address: run.to_address.clone(),
            text: inbound.text,
            occurred_at: run.created_at.to_rfc3339(),
            correlation_id: run.correlation_id.clone(),
            metadata: JsonValue::Object(metadata),
        };

        // Round-trip through Value so keys come out sorted, matching what the
        // receiver canonicalizes before verifying.
        let value = serde_json::to_value(&event)
            .map_err(|e| DispatchError::Rejected(e.to_string()))?;
        serde_json::to_string(&value).map_err(|e| DispatchError::Rejected(e.to_string()))
    }
}
