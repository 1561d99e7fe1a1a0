use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::get_config;
use crate::error::Result;

/// Connection pool sized for the webhook intake path: every inbound delivery
/// touches the run or event ledger before it is acknowledged, so acquisition
/// is kept short and failures surface quickly instead of queueing behind a
/// saturated pool. Both knobs come from `Config`.
pub async fn create_pool() -> Result<PgPool> {
    let config = get_config();
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_secs))
        .connect(&config.database_url)
        .await?;
    Ok(pool)
}
