//! Fixed-window rate limiting keyed by tenant + action. The limiter is an
//! explicitly constructed, injected value backed by a shared store, so
//! horizontally scaled instances counting against the same store coordinate
//! correctly; there is no hidden process-wide state.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::error::{Error, Result};

/// Shared counter store. `hit` bumps the counter for `key` inside the current
/// window and returns the post-increment count, resetting expired windows.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn hit(&self, key: &str, window: Duration) -> Result<u64>;
}

pub struct RateLimiter {
    store: std::sync::Arc<dyn RateLimitStore>,
    limit: u64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: std::sync::Arc<dyn RateLimitStore>, limit: u64, window: Duration) -> Self {
        Self {
            store,
            limit: limit.max(1),
            window,
        }
    }

    pub async fn check(&self, tenant: &str, action: &str) -> Result<()> {
        let key = format!("{}:{}", tenant, action);
        let count = self.store.hit(&key, self.window).await?;
        if count > self.limit {
            warn!(%key, count, "rate limit exceeded");
            return Err(Error::RateLimited);
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgRateLimitStore {
    pool: PgPool,
}

impl PgRateLimitStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateLimitStore for PgRateLimitStore {
    async fn hit(&self, key: &str, window: Duration) -> Result<u64> {
        let row = sqlx::query(
            "INSERT INTO rate_limit_windows (key, window_start, count) VALUES ($1, NOW(), 1) \
             ON CONFLICT (key) DO UPDATE SET \
               count = CASE WHEN rate_limit_windows.window_start <= NOW() - make_interval(secs => $2) \
                            THEN 1 ELSE rate_limit_windows.count + 1 END, \
               window_start = CASE WHEN rate_limit_windows.window_start <= NOW() - make_interval(secs => $2) \
                                   THEN NOW() ELSE rate_limit_windows.window_start END \
             RETURNING count",
        )
        .bind(key)
        .bind(window.as_secs_f64())
        .fetch_one(&self.pool)
        .await?;
        let count: i64 = row.try_get("count")?;
        Ok(count.max(0) as u64)
    }
}

#[derive(Default)]
pub struct MemoryRateLimitStore {
    windows: Mutex<HashMap<String, (Instant, u64)>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn hit(&self, key: &str, window: Duration) -> Result<u64> {
        let mut windows = self.windows.lock().expect("rate limit store poisoned");
        let now = Instant::now();
        let entry = windows.entry(key.to_string()).or_insert((now, 0));
        if now.duration_since(entry.0) >= window {
            *entry = (now, 0);
        }
        entry.1 += 1;
        Ok(entry.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn limiter(limit: u64, window: Duration) -> RateLimiter {
        RateLimiter::new(Arc::new(MemoryRateLimitStore::new()), limit, window)
    }

    #[tokio::test]
    async fn allows_up_to_limit_then_rejects() {
        let limiter = limiter(3, Duration::from_secs(60));
        for _ in 0..3 {
            limiter.check("tenant-a", "chat_intake").await.unwrap();
        }
        assert!(matches!(
            limiter.check("tenant-a", "chat_intake").await,
            Err(Error::RateLimited)
        ));
    }

    #[tokio::test]
    async fn keys_are_isolated_per_tenant_and_action() {
        let limiter = limiter(1, Duration::from_secs(60));
        limiter.check("tenant-a", "chat_intake").await.unwrap();
        limiter.check("tenant-b", "chat_intake").await.unwrap();
        limiter.check("tenant-a", "voice_intent").await.unwrap();
        assert!(limiter.check("tenant-a", "chat_intake").await.is_err());
    }

    #[tokio::test]
    async fn window_expiry_resets_the_counter() {
        let limiter = limiter(1, Duration::from_millis(40));
        limiter.check("tenant-a", "chat_intake").await.unwrap();
        assert!(limiter.check("tenant-a", "chat_intake").await.is_err());
        tokio::time::sleep(Duration::from_millis(50)).await;
        limiter.check("tenant-a", "chat_intake").await.unwrap();
    }
}
