// src/config.rs

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use secrecy::SecretString;
use url::Url;

/// Chiliz Chain mainnet
pub const DEFAULT_CHAIN_ID: u64 = 88888;
pub const DEFAULT_EXPLORER_API_URL: &str = "https://scan.chiliz.com/api";
pub const DEFAULT_EXPLORER_WEB_URL: &str = "https://scan.chiliz.com";
pub const DEFAULT_AI_API_URL: &str = "https://nebula-api.thirdweb.com";
pub const DEFAULT_CHAIN_RPC_URL: &str = "https://rpc.ankr.com/chiliz";
/// Sent as `x-client-id` on every outbound request.
pub const DEFAULT_CLIENT_ID: &str = "chiliz-chat-server";

// A struct to hold all configuration, loaded once at startup from the .env file.
#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub port: u16,

    // Data sources
    pub explorer_api_url: String,
    pub explorer_web_url: String,
    pub ai_api_url: String,
    pub ai_secret_key: SecretString,
    pub client_id: String,

    /// Chain every conversation and execute request is scoped to.
    pub chain_id: u64,

    /// How many times the aggregator tries each explorer sub-lookup.
    pub lookup_attempts: u32,

    // Headless signer settings
    pub chain_rpc_url: String,
    pub signer_private_key: Option<SecretString>,
    pub receipt_poll_attempts: u32,
    pub receipt_poll_interval_ms: u64,

    // Conversation housekeeping
    /// Conversations untouched this long are dropped from memory.
    pub conversation_idle_secs: u64,
    pub max_conversations: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            explorer_api_url: DEFAULT_EXPLORER_API_URL.to_string(),
            explorer_web_url: DEFAULT_EXPLORER_WEB_URL.to_string(),
            ai_api_url: DEFAULT_AI_API_URL.to_string(),
            ai_secret_key: SecretString::new(String::new()),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            chain_id: DEFAULT_CHAIN_ID,
            lookup_attempts: 1,
            chain_rpc_url: DEFAULT_CHAIN_RPC_URL.to_string(),
            signer_private_key: None,
            receipt_poll_attempts: 30,
            receipt_poll_interval_ms: 2_000,
            conversation_idle_secs: 3_600,
            max_conversations: 1_000,
        }
    }
}

impl Config {
    /// Whether the server can sign execute requests itself.
    pub fn has_headless_signer(&self) -> bool {
        self.signer_private_key.is_some()
    }

    pub fn conversation_idle(&self) -> Duration {
        Duration::from_secs(self.conversation_idle_secs)
    }

    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load variables from the .env file into the environment
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let config = Config {
            port: parse_var("PORT", defaults.port)?,
            explorer_api_url: url_var("EXPLORER_API_URL", &defaults.explorer_api_url)?,
            explorer_web_url: url_var("EXPLORER_WEB_URL", &defaults.explorer_web_url)?,
            ai_api_url: url_var("AI_API_URL", &defaults.ai_api_url)?,
            ai_secret_key: SecretString::new(env::var("AI_SECRET_KEY").unwrap_or_default()),
            client_id: env::var("CLIENT_ID").unwrap_or(defaults.client_id),
            chain_id: parse_var("CHAIN_ID", defaults.chain_id)?,
            lookup_attempts: parse_var("LOOKUP_ATTEMPTS", defaults.lookup_attempts)?.max(1),
            chain_rpc_url: url_var("CHAIN_RPC_URL", &defaults.chain_rpc_url)?,
            signer_private_key: env::var("SIGNER_PRIVATE_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty())
                .map(SecretString::new),
            receipt_poll_attempts: parse_var("RECEIPT_POLL_ATTEMPTS", defaults.receipt_poll_attempts)?,
            receipt_poll_interval_ms: parse_var(
                "RECEIPT_POLL_INTERVAL_MS",
                defaults.receipt_poll_interval_ms,
            )?,
            conversation_idle_secs: parse_var("CONVERSATION_IDLE_SECS", defaults.conversation_idle_secs)?,
            max_conversations: parse_var("MAX_CONVERSATIONS", defaults.max_conversations)?.max(1),
        };

        if env::var("AI_SECRET_KEY").is_err() {
            tracing::warn!("AI_SECRET_KEY is not set; conversation and execute calls will be rejected upstream");
        }

        Ok(config)
    }
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} must be a valid number", key)),
        Err(_) => Ok(default),
    }
}

fn url_var(key: &str, default: &str) -> Result<String> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).with_context(|| format!("{} must be an absolute URL", key))?;
    Ok(raw.trim_end_matches('/').to_string())
}
