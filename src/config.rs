use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// Independent HMAC secret per trust boundary. A signature minted for one
    /// boundary must never verify against another.
    pub chat_webhook_secret: String,
    pub voice_webhook_secret: String,
    pub engine_webhook_secret: String,
    pub payment_webhook_secret: String,
    pub callback_token_secret: String,
    pub callback_token_ttl_secs: i64,
    pub replay_window_secs: i64,
    pub sync_reply_timeout_ms: u64,
    pub voice_fallback_text: String,
    pub dispatch_backoff_ms: u64,
    pub webhook_rate_limit: u64,
    pub webhook_rate_window_secs: u64,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            db_max_connections: get_env_or_parse("DB_MAX_CONNECTIONS", 20)?,
            db_acquire_timeout_secs: get_env_or_parse("DB_ACQUIRE_TIMEOUT_SECS", 5)?,
            chat_webhook_secret: get_env("CHAT_WEBHOOK_SECRET")?,
            voice_webhook_secret: get_env("VOICE_WEBHOOK_SECRET")?,
            engine_webhook_secret: get_env("ENGINE_WEBHOOK_SECRET")?,
            payment_webhook_secret: get_env("PAYMENT_WEBHOOK_SECRET")?,
            callback_token_secret: get_env("CALLBACK_TOKEN_SECRET")?,
            callback_token_ttl_secs: get_env_or_parse("CALLBACK_TOKEN_TTL_SECS", 600)?,
            replay_window_secs: get_env_or_parse("REPLAY_WINDOW_SECS", 300)?,
            sync_reply_timeout_ms: get_env_or_parse("SYNC_REPLY_TIMEOUT_MS", 4000)?,
            voice_fallback_text: env::var("VOICE_FALLBACK_TEXT").unwrap_or_else(|_| {
                "Sorry, I could not process that right now. Please try again in a moment."
                    .to_string()
            }),
            dispatch_backoff_ms: get_env_or_parse("DISPATCH_BACKOFF_MS", 500)?,
            webhook_rate_limit: get_env_or_parse("WEBHOOK_RATE_LIMIT", 120)?,
            webhook_rate_window_secs: get_env_or_parse("WEBHOOK_RATE_WINDOW_SECS", 60)?,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_or_parse<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
