// src/lib.rs

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

pub mod ai;
pub mod api;
pub mod blockchain;
pub mod config;
pub mod engine;
pub mod mcp;
pub mod utils;

use ai::client::{AiClient, AiSource};
use blockchain::{
    client::{ExplorerClient, ExplorerSource},
    signer::{LocalWalletSigner, TransactionSigner},
};
use config::Config;
use engine::{QueryEngine, SessionManager, TransactionExecutor};

/// Open conversations keyed by session id.
pub type Conversations = Arc<DashMap<String, Arc<Mutex<SessionManager>>>>;

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Config,
    /// Stateless classify -> resolve -> format pipeline
    pub engine: QueryEngine,
    pub explorer: Arc<dyn ExplorerSource>,
    pub ai: Arc<dyn AiSource>,
    pub conversations: Conversations,
    /// Headless wallet; without one, execute requests stop after preparing.
    pub signer: Option<Arc<dyn TransactionSigner>>,
}

impl AppState {
    pub fn new(
        config: Config,
        explorer: Arc<dyn ExplorerSource>,
        ai: Arc<dyn AiSource>,
        signer: Option<Arc<dyn TransactionSigner>>,
    ) -> Self {
        Self {
            engine: QueryEngine::new(explorer.clone(), &config),
            config,
            explorer,
            ai,
            conversations: Arc::new(DashMap::new()),
            signer,
        }
    }

    /// Builds the real HTTP-backed sources from `config`.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let explorer = Arc::new(ExplorerClient::new(&config.explorer_api_url, &config.client_id)?);
        let ai = Arc::new(AiClient::new(
            &config.ai_api_url,
            &config.ai_secret_key,
            &config.client_id,
        )?);
        let signer: Option<Arc<dyn TransactionSigner>> = match &config.signer_private_key {
            Some(key) => Some(Arc::new(LocalWalletSigner::new(
                key,
                &config.chain_rpc_url,
                config.receipt_poll_attempts,
                config.receipt_poll_interval_ms,
            )?)),
            None => None,
        };
        Ok(Self::new(config, explorer, ai, signer))
    }

    pub fn new_session_manager(&self) -> SessionManager {
        SessionManager::new(self.ai.clone(), self.config.chain_id)
    }

    pub fn conversation(&self, session_id: &str) -> Option<Arc<Mutex<SessionManager>>> {
        self.conversations.get(session_id).map(|entry| entry.value().clone())
    }

    /// Drops conversations idle for at least `ttl` and returns how many went.
    /// Conversations with a turn in flight are locked and always survive.
    /// Their upstream sessions are left to expire on the AI service.
    pub fn evict_idle_conversations(&self, ttl: Duration) -> usize {
        let mut evicted = 0;
        self.conversations.retain(|session_id, conversation| match conversation.try_lock() {
            Ok(manager) if manager.idle_for() >= ttl => {
                debug!(session_id = %session_id, "Evicting idle conversation");
                evicted += 1;
                false
            }
            _ => true,
        });
        evicted
    }

    pub fn executor(&self) -> TransactionExecutor {
        TransactionExecutor::new(self.ai.clone())
    }
}
