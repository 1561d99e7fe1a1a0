pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::config::get_config;
use crate::database::event_store::{PgWebhookEventStore, WebhookEventStore};
use crate::database::run_store::{PgRunStore, RunStore};
use crate::middleware::rate_limit::{PgRateLimitStore, RateLimitStore, RateLimiter};
use crate::services::audit_service::{AuditSink, PgAuditSink};
use crate::services::correlation_service::ResponseCorrelator;
use crate::services::dispatch_service::{DispatchClient, EngineTransport, HttpEngineTransport};
use crate::services::event_ledger::EventIdempotencyLedger;
use crate::services::run_ledger::RunLedger;
use crate::services::telephony::{provider_registry, TelephonyProvider};
use crate::services::tenant_directory::{PgTenantDirectory, TenantDirectory};
use crate::utils::callback_token::CallbackTokenIssuer;
use crate::utils::signature::SignatureGate;

/// One verification gate per trust boundary. Secrets never cross boundaries:
/// a chat signature cannot open the payment gate.
pub struct BoundaryGates {
    pub chat: SignatureGate,
    pub voice: SignatureGate,
    pub engine: SignatureGate,
    pub payment: SignatureGate,
}

#[derive(Clone)]
pub struct AppState {
    pub gates: Arc<BoundaryGates>,
    pub tokens: CallbackTokenIssuer,
    pub directory: Arc<dyn TenantDirectory>,
    pub audit: Arc<dyn AuditSink>,
    pub run_ledger: RunLedger,
    pub correlator: Arc<ResponseCorrelator>,
    pub event_ledger: EventIdempotencyLedger,
    pub rate_limiter: Arc<RateLimiter>,
    pub providers: Arc<HashMap<&'static str, Arc<dyn TelephonyProvider>>>,
    pub voice_fallback_text: String,
    pub sync_reply_budget: Duration,
}

/// Everything `AppState` needs, with every seam injectable. Production wiring
/// goes through [`AppState::new`]; tests swap in memory stores and stub
/// transports through [`AppState::from_parts`].
pub struct StateParts {
    pub chat_secret: String,
    pub voice_secret: String,
    pub engine_secret: String,
    pub payment_secret: String,
    pub callback_token_secret: String,
    pub callback_token_ttl_secs: i64,
    pub replay_window_secs: i64,
    pub run_store: Arc<dyn RunStore>,
    pub event_store: Arc<dyn WebhookEventStore>,
    pub directory: Arc<dyn TenantDirectory>,
    pub audit: Arc<dyn AuditSink>,
    pub transport: Arc<dyn EngineTransport>,
    pub rate_store: Arc<dyn RateLimitStore>,
    pub rate_limit: u64,
    pub rate_window: Duration,
    pub backoff_base: Duration,
    pub sync_reply_budget: Duration,
    pub voice_fallback_text: String,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let cfg = get_config();
        Self::from_parts(StateParts {
            chat_secret: cfg.chat_webhook_secret.clone(),
            voice_secret: cfg.voice_webhook_secret.clone(),
            engine_secret: cfg.engine_webhook_secret.clone(),
            payment_secret: cfg.payment_webhook_secret.clone(),
            callback_token_secret: cfg.callback_token_secret.clone(),
            callback_token_ttl_secs: cfg.callback_token_ttl_secs,
            replay_window_secs: cfg.replay_window_secs,
            run_store: Arc::new(PgRunStore::new(pool.clone())),
            event_store: Arc::new(PgWebhookEventStore::new(pool.clone())),
            directory: Arc::new(PgTenantDirectory::new(pool.clone())),
            audit: Arc::new(PgAuditSink::new(pool.clone())),
            transport: Arc::new(HttpEngineTransport::new()),
            rate_store: Arc::new(PgRateLimitStore::new(pool)),
            rate_limit: cfg.webhook_rate_limit,
            rate_window: Duration::from_secs(cfg.webhook_rate_window_secs),
            backoff_base: Duration::from_millis(cfg.dispatch_backoff_ms),
            sync_reply_budget: Duration::from_millis(cfg.sync_reply_timeout_ms),
            voice_fallback_text: cfg.voice_fallback_text.clone(),
        })
    }

    pub fn from_parts(parts: StateParts) -> Self {
        let gates = Arc::new(BoundaryGates {
            chat: SignatureGate::new(&parts.chat_secret, parts.replay_window_secs),
            voice: SignatureGate::new(&parts.voice_secret, parts.replay_window_secs),
            engine: SignatureGate::new(&parts.engine_secret, parts.replay_window_secs),
            payment: SignatureGate::new(&parts.payment_secret, parts.replay_window_secs),
        });
        let tokens = CallbackTokenIssuer::new(
            &parts.callback_token_secret,
            parts.callback_token_ttl_secs,
        );

        // Outbound dispatches are signed with the engine boundary gate, so
        // the engine verifies them against the one secret it shares with us.
        let dispatch = Arc::new(DispatchClient::new(
            parts.run_store.clone(),
            parts.transport,
            gates.engine.clone(),
            tokens.clone(),
            parts.backoff_base,
        ));
        let run_ledger = RunLedger::new(parts.run_store);
        let correlator = Arc::new(ResponseCorrelator::new(
            run_ledger.clone(),
            dispatch,
            parts.directory.clone(),
        ));

        Self {
            gates,
            tokens,
            directory: parts.directory,
            audit: parts.audit,
            run_ledger,
            correlator,
            event_ledger: EventIdempotencyLedger::new(parts.event_store),
            rate_limiter: Arc::new(RateLimiter::new(
                parts.rate_store,
                parts.rate_limit,
                parts.rate_window,
            )),
            providers: Arc::new(provider_registry()),
            voice_fallback_text: parts.voice_fallback_text,
            sync_reply_budget: parts.sync_reply_budget,
        }
    }
}
