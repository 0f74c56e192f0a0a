// src/ai/client.rs

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client, Method, RequestBuilder,
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::models::{
    AiResponse, ChatRequest, ContextFilter, ConversationSession, ExecuteConfig, ExecuteRequest,
    ExecutionIntent, SessionRecord, SessionUpdate, Visibility,
};
use crate::blockchain::{client::http_client, models::Address};

/// Static secret header expected by the AI service.
pub const SECRET_KEY_HEADER: &str = "x-secret-key";

/// Conversational AI service: sessions, chat turns and execute commands.
///
/// Like the explorer, every method is single-shot and answers `None`/`false`
/// instead of failing.
#[async_trait]
pub trait AiSource: Send + Sync {
    async fn create_session(&self, title: &str) -> Option<ConversationSession>;

    async fn update_session(&self, session_id: &str, update: &SessionUpdate) -> Option<ConversationSession>;

    async fn clear_session(&self, session_id: &str) -> bool;

    async fn delete_session(&self, session_id: &str) -> bool;

    async fn send_message(
        &self,
        text: &str,
        session_id: &str,
        chain_id: u64,
        contract_address: Option<&Address>,
    ) -> Option<AiResponse>;

    async fn execute_command(&self, intent: &ExecutionIntent) -> Option<AiResponse>;
}

/// reqwest-backed [`AiSource`].
#[derive(Clone)]
pub struct AiClient {
    http: Client,
    base_url: String,
}

impl AiClient {
    pub fn new(base_url: &str, secret_key: &SecretString, client_id: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut secret = HeaderValue::from_str(secret_key.expose_secret())
            .context("AI_SECRET_KEY is not a valid header value")?;
        secret.set_sensitive(true);
        headers.insert(HeaderName::from_static(SECRET_KEY_HEADER), secret);

        Ok(Self {
            http: http_client(client_id, headers)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
    }

    /// Sends `builder` and returns the JSON body of a 2xx response.
    async fn send(&self, operation: &str, builder: RequestBuilder) -> Option<Value> {
        let res = match builder.send().await {
            Ok(res) => res,
            Err(e) => {
                warn!(operation, error = %e, "AI service request failed");
                return None;
            }
        };
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(operation, status = %status, body = %body, "AI service returned non-success status");
            return None;
        }
        let body = res.text().await.unwrap_or_default();
        if body.trim().is_empty() {
            return Some(Value::Null);
        }
        match serde_json::from_str(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(operation, error = %e, "AI service response was not JSON");
                None
            }
        }
    }
}

/// Session documents arrive either bare or wrapped in `{ "result": ... }`.
fn parse_session(body: Value, fallback_title: &str) -> Option<ConversationSession> {
    let record = match body.get("result") {
        Some(inner) if inner.is_object() => inner.clone(),
        _ => body,
    };
    let record: SessionRecord = serde_json::from_value(record).ok()?;
    if !valid_session_id(&record.id) {
        return None;
    }
    let created_at = record
        .created_at
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    Some(ConversationSession {
        session_id: record.id,
        created_at,
        title: record.title.unwrap_or_else(|| fallback_title.to_string()),
        visibility: Visibility::from_public_flag(record.is_public.unwrap_or(false)),
    })
}

/// Session ids are spliced into URL paths, so only `[A-Za-z0-9_-]` is allowed.
fn valid_session_id(session_id: &str) -> bool {
    !session_id.is_empty()
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[async_trait]
impl AiSource for AiClient {
    async fn create_session(&self, title: &str) -> Option<ConversationSession> {
        let body = json!({ "title": title, "is_public": false });
        let response = self
            .send("create_session", self.request(Method::POST, "/session").json(&body))
            .await?;
        parse_session(response, title)
    }

    async fn update_session(&self, session_id: &str, update: &SessionUpdate) -> Option<ConversationSession> {
        if !valid_session_id(session_id) {
            debug!("Skipping session update without a session id");
            return None;
        }
        let path = format!("/session/{}", session_id);
        let response = self
            .send("update_session", self.request(Method::PUT, &path).json(update))
            .await?;
        parse_session(response, update.title.as_deref().unwrap_or_default())
    }

    async fn clear_session(&self, session_id: &str) -> bool {
        if !valid_session_id(session_id) {
            return false;
        }
        let path = format!("/session/{}/clear", session_id);
        self.send("clear_session", self.request(Method::POST, &path))
            .await
            .is_some()
    }

    async fn delete_session(&self, session_id: &str) -> bool {
        if !valid_session_id(session_id) {
            return false;
        }
        let path = format!("/session/{}", session_id);
        self.send("delete_session", self.request(Method::DELETE, &path))
            .await
            .is_some()
    }

    async fn send_message(
        &self,
        text: &str,
        session_id: &str,
        chain_id: u64,
        contract_address: Option<&Address>,
    ) -> Option<AiResponse> {
        if text.trim().is_empty() || !valid_session_id(session_id) {
            debug!("Skipping chat turn with empty message or session id");
            return None;
        }
        let body = ChatRequest {
            message: text,
            session_id,
            context_filter: ContextFilter::new(chain_id, contract_address),
            stream: false,
        };
        let response = self
            .send("chat", self.request(Method::POST, "/chat").json(&body))
            .await?;
        Some(AiResponse::from_body(response))
    }

    async fn execute_command(&self, intent: &ExecutionIntent) -> Option<AiResponse> {
        if intent.command.trim().is_empty() || !valid_session_id(&intent.session_id) {
            debug!("Skipping execute with empty command or session id");
            return None;
        }
        let body = ExecuteRequest {
            message: &intent.command,
            session_id: &intent.session_id,
            context_filter: ContextFilter::new(intent.chain_id, intent.contract_address.as_ref()),
            execute_config: ExecuteConfig {
                mode: "client",
                signer_wallet_address: intent.signer_address.as_str().to_string(),
            },
        };
        let response = self
            .send("execute", self.request(Method::POST, "/execute").json(&body))
            .await?;
        Some(AiResponse::from_body(response))
    }
}
