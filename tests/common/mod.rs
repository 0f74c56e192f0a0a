//! In-memory sources shared by the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use chiliz_chat_server::{
    ai::{
        client::AiSource,
        models::{AiResponse, ConversationSession, ExecutionIntent, SessionUpdate, Visibility},
    },
    blockchain::{
        client::ExplorerSource,
        models::{Address, ContractInfo, ExplorerToken, TokenSearchHit, TransactionInfo, TxHash},
    },
    config::Config,
    AppState,
};

pub const RECIPIENT: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";

/// Explorer that knows everything about every address.
#[derive(Default)]
pub struct FakeExplorer {
    pub empty: bool,
}

#[async_trait]
impl ExplorerSource for FakeExplorer {
    async fn get_balance(&self, _address: &str) -> Option<String> {
        (!self.empty).then(|| "2500000000000000000".to_string())
    }

    async fn get_token_info(&self, contract_address: &str) -> Option<ExplorerToken> {
        (!self.empty).then(|| ExplorerToken {
            name: Some("Sample Token".into()),
            symbol: Some("SMP".into()),
            decimals: Some("18".into()),
            total_supply: Some("1000000000000000000000000".into()),
            token_type: Some("ERC-20".into()),
            contract_address: Some(contract_address.to_string()),
        })
    }

    async fn get_contract_info(&self, _contract_address: &str) -> Option<ContractInfo> {
        (!self.empty).then(|| ContractInfo {
            contract_name: Some("SampleToken".into()),
            compiler_version: Some("v0.8.19+commit.7dd6d404".into()),
            optimization_used: Some(false),
            license: Some("MIT".into()),
            abi: Some("[]".into()),
        })
    }

    async fn get_transaction_info(&self, tx_hash: &str) -> Option<TransactionInfo> {
        if self.empty {
            return None;
        }
        Some(TransactionInfo {
            hash: TxHash::parse(tx_hash)?,
            block_number: Some("12345678".into()),
            from: Some("0x0000000000000000000000000000000000000001".into()),
            to: Some(RECIPIENT.into()),
            value: Some("1500000000000000000".into()),
            gas_used: Some("21000".into()),
            success: Some(true),
        })
    }

    async fn search_token(&self, query: &str) -> Option<Vec<TokenSearchHit>> {
        Some(vec![TokenSearchHit {
            name: Some(format!("{} Token", query)),
            symbol: Some(query.to_uppercase()),
            address: Some(RECIPIENT.to_string()),
            token_type: Some("ERC-20".into()),
        }])
    }
}

/// AI service that echoes messages and answers execute commands with a
/// transfer to [`RECIPIENT`].
#[derive(Default)]
pub struct FakeAi {
    pub sessions: AtomicUsize,
    pub messages: AtomicUsize,
}

#[async_trait]
impl AiSource for FakeAi {
    async fn create_session(&self, title: &str) -> Option<ConversationSession> {
        let n = self.sessions.fetch_add(1, Ordering::SeqCst);
        Some(ConversationSession {
            session_id: format!("session-{}", n),
            created_at: Utc::now(),
            title: title.to_string(),
            visibility: Visibility::Private,
        })
    }

    async fn update_session(&self, session_id: &str, update: &SessionUpdate) -> Option<ConversationSession> {
        Some(ConversationSession {
            session_id: session_id.to_string(),
            created_at: Utc::now(),
            title: update.title.clone().unwrap_or_default(),
            visibility: Visibility::from_public_flag(update.is_public.unwrap_or(false)),
        })
    }

    async fn clear_session(&self, _session_id: &str) -> bool {
        true
    }

    async fn delete_session(&self, _session_id: &str) -> bool {
        true
    }

    async fn send_message(
        &self,
        text: &str,
        _session_id: &str,
        _chain_id: u64,
        _contract_address: Option<&Address>,
    ) -> Option<AiResponse> {
        self.messages.fetch_add(1, Ordering::SeqCst);
        Some(AiResponse::from_body(json!({ "message": format!("AI: {}", text) })))
    }

    async fn execute_command(&self, _intent: &ExecutionIntent) -> Option<AiResponse> {
        Some(AiResponse::from_body(json!({
            "message": "Please sign",
            "actions": [{
                "type": "sign_transaction",
                "data": format!("{{\"to\":\"{}\",\"value\":\"1000000000000000000\",\"data\":\"0x\"}}", RECIPIENT)
            }]
        })))
    }
}

pub fn test_state() -> (AppState, Arc<FakeAi>) {
    state_with(FakeExplorer::default())
}

pub fn state_with(explorer: FakeExplorer) -> (AppState, Arc<FakeAi>) {
    let ai = Arc::new(FakeAi::default());
    let state = AppState::new(Config::default(), Arc::new(explorer), ai.clone(), None);
    (state, ai)
}

pub fn state_with_config(config: Config) -> (AppState, Arc<FakeAi>) {
    let ai = Arc::new(FakeAi::default());
    let state = AppState::new(config, Arc::new(FakeExplorer::default()), ai.clone(), None);
    (state, ai)
}
