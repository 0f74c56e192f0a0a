// src/ai/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::blockchain::models::Address;

/// Action type the AI uses for an unsigned transaction.
pub const SIGN_TRANSACTION_ACTION: &str = "sign_transaction";

// --- Session Models ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Private,
    Public,
}

impl Visibility {
    pub fn from_public_flag(is_public: bool) -> Self {
        if is_public {
            Visibility::Public
        } else {
            Visibility::Private
        }
    }
}

/// A server-side conversation held by the AI service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationSession {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub visibility: Visibility,
}

/// Fields that can be changed on an existing session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

/// Session document as the AI service returns it.
#[derive(Debug, Deserialize)]
pub struct SessionRecord {
    #[serde(alias = "session_id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub is_public: Option<bool>,
}

// --- Request Models ---

#[derive(Debug, Clone, Serialize)]
pub struct ContextFilter {
    pub chain_ids: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_addresses: Option<Vec<String>>,
}

impl ContextFilter {
    pub fn new(chain_id: u64, contract_address: Option<&Address>) -> Self {
        Self {
            chain_ids: vec![chain_id],
            contract_addresses: contract_address.map(|a| vec![a.as_str().to_string()]),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
    pub session_id: &'a str,
    pub context_filter: ContextFilter,
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteConfig {
    pub mode: &'static str,
    pub signer_wallet_address: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteRequest<'a> {
    pub message: &'a str,
    pub session_id: &'a str,
    pub context_filter: ContextFilter,
    pub execute_config: ExecuteConfig,
}

/// One execute call: a natural-language command and who will sign the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionIntent {
    pub command: String,
    pub signer_address: Address,
    pub chain_id: u64,
    pub contract_address: Option<Address>,
    pub session_id: String,
}

// --- Response Models ---

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AiAction {
    #[serde(rename = "type")]
    pub kind: String,
    /// A JSON-encoded string for `sign_transaction`, otherwise free-form.
    #[serde(default)]
    pub data: Value,
}

/// Body of a 2xx chat or execute reply. Built leniently: a field with an
/// unexpected shape is dropped instead of discarding the whole reply.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AiResponse {
    pub message: Option<String>,
    /// Well-formed actions only; entries without a `type` are skipped.
    pub actions: Vec<AiAction>,
    pub session_id: Option<String>,
    /// The untouched response body, kept for debugging failed executions.
    pub raw: Value,
}

impl AiResponse {
    pub fn from_body(body: Value) -> Self {
        let text = |key: &str| body.get(key).and_then(Value::as_str).map(str::to_string);
        let message = text("message");
        let session_id = text("session_id");
        let actions = body
            .get("actions")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value::<AiAction>(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            message,
            actions,
            session_id,
            raw: body,
        }
    }

    pub fn sign_transaction_action(&self) -> Option<&AiAction> {
        self.actions
            .iter()
            .find(|action| action.kind == SIGN_TRANSACTION_ACTION)
    }
}
