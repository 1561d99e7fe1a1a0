use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::automation_run::{InboundEvent, RunStatus};
use crate::services::dispatch_service::DispatchClient;
use crate::services::run_ledger::RunLedger;
use crate::services::tenant_directory::TenantDirectory;

/// How the caller wants to wait for the engine.
#[derive(Debug, Clone, Copy)]
pub enum ExecutionMode {
    /// Block the request handler up to the given budget (telephony intent,
    /// which must answer inside the gateway's hard timeout).
    Blocking(Duration),
    /// Insert, spawn the dispatch, acknowledge immediately (chat and generic
    /// triggers).
    Background,
}

#[derive(Debug)]
pub enum CorrelationOutcome {
    /// Dispatch finished inside the budget.
    Completed { run_id: Uuid, response: JsonValue },
    /// A previous delivery already owns this event; its stored state is
    /// returned with zero dispatch calls.
    Duplicate {
        run_id: Uuid,
        status: RunStatus,
        response: Option<JsonValue>,
    },
    /// Background mode acknowledgment; the run id is the caller's
    /// correlation handle.
    Accepted { run_id: Uuid },
    /// The budget elapsed. The in-flight dispatch is NOT cancelled; it keeps
    /// running and records its own terminal state.
    TimedOut { run_id: Uuid },
    /// Dispatch finished inside the budget with a terminal failure.
    Failed { run_id: Uuid },
}

/// Single "execute or fetch cached" core shared by the synchronous and
/// asynchronous entry points; the two differ only in execution strategy.
pub struct ResponseCorrelator {
    ledger: RunLedger,
    dispatch: Arc<DispatchClient>,
    directory: Arc<dyn TenantDirectory>,
}

impl ResponseCorrelator {
    pub fn new(
        ledger: RunLedger,
        dispatch: Arc<DispatchClient>,
        directory: Arc<dyn TenantDirectory>,
    ) -> Self {
        Self {
            ledger,
            dispatch,
            directory,
        }
    }

    pub async fn execute_or_fetch(
        &self,
        event: InboundEvent,
        mode: ExecutionMode,
    ) -> Result<CorrelationOutcome> {
        let cfg = self
            .directory
            .workflow_config(event.tenant_id)
            .await?
            .ok_or_else(|| Error::NotFound("workflow_not_configured".to_string()))?;

        let (run, is_new) = self.ledger.get_or_create(&event).await?;
        if !is_new {
            debug!(run_id = %run.id, status = %run.status, "duplicate delivery, answering from ledger");
            return Ok(CorrelationOutcome::Duplicate {
                run_id: run.id,
                status: run.status,
                response: run.response_payload,
            });
        }

        let run_id = run.id;
        let dispatch = self.dispatch.clone();

        match mode {
            ExecutionMode::Background => {
                tokio::spawn(async move {
                    if let Err(e) = dispatch.dispatch(run, cfg).await {
                        warn!(run_id = %run_id, error = %e, "background dispatch failed");
                    }
                });
                Ok(CorrelationOutcome::Accepted { run_id })
            }
            ExecutionMode::Blocking(budget) => {
                let handle = tokio::spawn(async move { dispatch.dispatch(run, cfg).await });
                match tokio::time::timeout(budget, handle).await {
                    Ok(Ok(Ok(response))) => {
                        Ok(CorrelationOutcome::Completed { run_id, response })
                    }
                    Ok(Ok(Err(e))) => {
                        warn!(run_id = %run_id, error = %e, "synchronous dispatch failed");
                        Ok(CorrelationOutcome::Failed { run_id })
                    }
                    Ok(Err(join_err)) => {
                        warn!(run_id = %run_id, error = %join_err, "dispatch task panicked");
                        Ok(CorrelationOutcome::Failed { run_id })
                    }
                    Err(_) => {
                        // Stop waiting, keep the call path alive. The detached
                        // task finishes on its own and updates the run row.
                        info!(run_id = %run_id, "reply budget elapsed, returning fallback");
                        Ok(CorrelationOutcome::TimedOut { run_id })
                    }
                }
            }
        }
    }
}
