#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use serde_json::Value as JsonValue;
use tower::ServiceExt;
use uuid::Uuid;

use automation_gateway::database::memory::{MemoryRunStore, MemoryWebhookEventStore};
use automation_gateway::middleware::rate_limit::MemoryRateLimitStore;
use automation_gateway::models::tenant::TenantWorkflowConfig;
use automation_gateway::routes;
use automation_gateway::services::audit_service::MemoryAuditSink;
use automation_gateway::services::dispatch_service::{
    EngineReply, EngineTransport, TransportFailure,
};
use automation_gateway::services::tenant_directory::MemoryTenantDirectory;
use automation_gateway::utils::signature::SignatureGate;
use automation_gateway::{AppState, StateParts};

pub const CHAT_SECRET: &str = "chat-boundary-secret";
pub const VOICE_SECRET: &str = "voice-boundary-secret";
pub const ENGINE_SECRET: &str = "engine-boundary-secret";
pub const PAYMENT_SECRET: &str = "payment-boundary-secret";
pub const CALLBACK_SECRET: &str = "callback-token-secret";
pub const TENANT_PHONE: &str = "+15550100";
pub const FALLBACK_TEXT: &str = "One moment please.";
pub const SYNC_BUDGET_MS: u64 = 250;

/// What the fake engine does when a dispatch reaches it.
pub enum EngineBehavior {
    Reply(&'static str),
    Slow(Duration),
    Reject(u16),
}

/// The last signed request the fake engine received.
#[derive(Clone)]
pub struct SignedPost {
    pub url: String,
    pub timestamp: i64,
    pub signature: String,
    pub body: String,
}

pub struct RecordingTransport {
    calls: AtomicUsize,
    last_post: Mutex<Option<SignedPost>>,
    behavior: EngineBehavior,
}

impl RecordingTransport {
    pub fn new(behavior: EngineBehavior) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            last_post: Mutex::new(None),
            behavior,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_post(&self) -> Option<SignedPost> {
        self.last_post.lock().unwrap().clone()
    }
}

#[async_trait]
impl EngineTransport for RecordingTransport {
    async fn post_event(
        &self,
        url: &str,
        timestamp: i64,
        signature: &str,
        body: String,
        _timeout: Duration,
    ) -> Result<EngineReply, TransportFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_post.lock().unwrap() = Some(SignedPost {
            url: url.to_string(),
            timestamp,
            signature: signature.to_string(),
            body,
        });
        match &self.behavior {
            EngineBehavior::Reply(body) => Ok(EngineReply {
                status: 200,
                body: (*body).to_string(),
            }),
            EngineBehavior::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(EngineReply {
                    status: 200,
                    body: r#"{"response_text":"too late"}"#.to_string(),
                })
            }
            EngineBehavior::Reject(status) => Ok(EngineReply {
                status: *status,
                body: r#"{"error":"rejected"}"#.to_string(),
            }),
        }
    }
}

pub struct Harness {
    pub app: Router,
    pub state: AppState,
    pub run_store: Arc<MemoryRunStore>,
    pub event_store: Arc<MemoryWebhookEventStore>,
    pub audit: Arc<MemoryAuditSink>,
    pub transport: Arc<RecordingTransport>,
    pub tenant_id: Uuid,
}

pub fn harness(behavior: EngineBehavior) -> Harness {
    let run_store = Arc::new(MemoryRunStore::new());
    let event_store = Arc::new(MemoryWebhookEventStore::new());
    let audit = Arc::new(MemoryAuditSink::new());
    let transport = RecordingTransport::new(behavior);
    let tenant_id = Uuid::new_v4();

    let directory = Arc::new(MemoryTenantDirectory::new().with_tenant(
        TENANT_PHONE,
        TenantWorkflowConfig {
            tenant_id,
            workflow_base_url: "https://engine.test".into(),
            workflow_id: "wf-main".into(),
            max_retries: 1,
            timeout_seconds: 1,
        },
    ));

    let state = AppState::from_parts(StateParts {
        chat_secret: CHAT_SECRET.into(),
        voice_secret: VOICE_SECRET.into(),
        engine_secret: ENGINE_SECRET.into(),
        payment_secret: PAYMENT_SECRET.into(),
        callback_token_secret: CALLBACK_SECRET.into(),
        callback_token_ttl_secs: 600,
        replay_window_secs: 300,
        run_store: run_store.clone(),
        event_store: event_store.clone(),
        directory,
        audit: audit.clone(),
        transport: transport.clone(),
        rate_store: Arc::new(MemoryRateLimitStore::default()),
        rate_limit: 100,
        rate_window: Duration::from_secs(60),
        backoff_base: Duration::from_millis(1),
        sync_reply_budget: Duration::from_millis(SYNC_BUDGET_MS),
        voice_fallback_text: FALLBACK_TEXT.into(),
    });

    Harness {
        app: routes::router(state.clone()),
        state,
        run_store,
        event_store,
        audit,
        transport,
        tenant_id,
    }
}

pub fn signed_post(path: &str, secret: &str, body: &JsonValue) -> Request<Body> {
    let raw = body.to_string();
    let gate = SignatureGate::new(secret, 300);
    let ts = Utc::now().timestamp();
    let canonical = SignatureGate::canonicalize(&raw).expect("test body is valid JSON");
    let signature = gate.sign(ts, &canonical);

    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .header("x-timestamp", ts.to_string())
        .header("x-signature", signature)
        .body(Body::from(raw))
        .unwrap()
}

pub fn unsigned_post(path: &str, body: &JsonValue) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn response_json(response: Response) -> JsonValue {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
