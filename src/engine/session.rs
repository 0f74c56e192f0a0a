// src/engine/session.rs

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ai::{
    client::AiSource,
    models::{AiResponse, ConversationSession, ExecutionIntent, SessionUpdate},
};
use crate::blockchain::models::Address;

pub const DEFAULT_SESSION_TITLE: &str = "Chiliz Chat";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No active conversation. Start a new conversation and try again.")]
    NoSession,
    #[error("The AI service could not {0}. Check your connection and try again.")]
    Unavailable(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Active(ConversationSession),
    /// Upstream context was reset; the id still accepts messages.
    Cleared(ConversationSession),
    Deleted,
}

/// Owns one conversation id against the AI service. Holds no message
/// history; context accumulates upstream.
///
/// Callers send at most one message per session at a time.
pub struct SessionManager {
    ai: Arc<dyn AiSource>,
    chain_id: u64,
    state: SessionState,
    last_active: Instant,
}

impl SessionManager {
    pub fn new(ai: Arc<dyn AiSource>, chain_id: u64) -> Self {
        Self {
            ai,
            chain_id,
            state: SessionState::Uninitialized,
            last_active: Instant::now(),
        }
    }

    /// Time since the last successful call against the AI service.
    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn session(&self) -> Option<&ConversationSession> {
        match &self.state {
            SessionState::Active(session) | SessionState::Cleared(session) => Some(session),
            SessionState::Uninitialized | SessionState::Deleted => None,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session().map(|s| s.session_id.as_str())
    }

    fn require_session(&self) -> Result<&ConversationSession, SessionError> {
        self.session().ok_or(SessionError::NoSession)
    }

    /// Starts a fresh session. Any previous session is orphaned upstream.
    pub async fn create_session(&mut self, title: &str) -> Result<ConversationSession, SessionError> {
        let title = if title.trim().is_empty() { DEFAULT_SESSION_TITLE } else { title.trim() };
        let session = self
            .ai
            .create_session(title)
            .await
            .ok_or(SessionError::Unavailable("start a conversation"))?;
        if let Some(previous) = self.session_id() {
            debug!(previous, "Orphaning previous session");
        }
        info!(session_id = %session.session_id, "Conversation session created");
        self.state = SessionState::Active(session.clone());
        self.last_active = Instant::now();
        Ok(session)
    }

    /// Returns the current session id, creating a session when none is usable.
    pub async fn ensure_session(&mut self) -> Result<String, SessionError> {
        if let Some(id) = self.session_id() {
            return Ok(id.to_string());
        }
        Ok(self.create_session(DEFAULT_SESSION_TITLE).await?.session_id)
    }

    pub async fn update_session(&mut self, update: &SessionUpdate) -> Result<ConversationSession, SessionError> {
        let current = self.require_session()?.clone();
        let updated = self
            .ai
            .update_session(&current.session_id, update)
            .await
            .ok_or(SessionError::Unavailable("update the conversation"))?;
        // The service may answer with a different shape; the id we hold stays authoritative.
        let session = ConversationSession {
            session_id: current.session_id,
            ..updated
        };
        self.state = match self.state {
            SessionState::Cleared(_) => SessionState::Cleared(session.clone()),
            _ => SessionState::Active(session.clone()),
        };
        self.last_active = Instant::now();
        Ok(session)
    }

    pub async fn send_message(
        &mut self,
        text: &str,
        contract_address: Option<&Address>,
    ) -> Result<AiResponse, SessionError> {
        let session = self.require_session()?.clone();
        let response = self
            .ai
            .send_message(text, &session.session_id, self.chain_id, contract_address)
            .await
            .ok_or(SessionError::Unavailable("answer the message"))?;
        self.state = SessionState::Active(session);
        self.last_active = Instant::now();
        Ok(response)
    }

    pub async fn clear(&mut self) -> Result<(), SessionError> {
        let session = self.require_session()?.clone();
        if !self.ai.clear_session(&session.session_id).await {
            warn!(session_id = %session.session_id, "Clearing session failed");
            return Err(SessionError::Unavailable("clear the conversation"));
        }
        info!(session_id = %session.session_id, "Conversation session cleared");
        self.state = SessionState::Cleared(session);
        self.last_active = Instant::now();
        Ok(())
    }

    /// Deletes the session upstream. On failure the session is kept so the
    /// caller can retry.
    pub async fn delete(&mut self) -> Result<(), SessionError> {
        let session_id = self.require_session()?.session_id.clone();
        if !self.ai.delete_session(&session_id).await {
            warn!(session_id = %session_id, "Deleting session failed");
            return Err(SessionError::Unavailable("delete the conversation"));
        }
        info!(session_id = %session_id, "Conversation session deleted");
        self.state = SessionState::Deleted;
        Ok(())
    }

    /// Binds an execute command to the current session.
    pub fn execution_intent(
        &self,
        command: &str,
        signer_address: Address,
        contract_address: Option<Address>,
    ) -> Result<ExecutionIntent, SessionError> {
        let session = self.require_session()?;
        Ok(ExecutionIntent {
            command: command.trim().to_string(),
            signer_address,
            chain_id: self.chain_id,
            contract_address,
            session_id: session.session_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::models::Visibility;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeAi {
        calls: AtomicUsize,
        offline: AtomicBool,
    }

    impl FakeAi {
        fn hit(&self) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            !self.offline.load(Ordering::SeqCst)
        }

        fn session(id: &str, title: &str) -> ConversationSession {
            ConversationSession {
                session_id: id.to_string(),
                created_at: Utc::now(),
                title: title.to_string(),
                visibility: Visibility::Private,
            }
        }
    }

    #[async_trait]
    impl AiSource for FakeAi {
        async fn create_session(&self, title: &str) -> Option<ConversationSession> {
            let n = self.calls.load(Ordering::SeqCst);
            self.hit().then(|| Self::session(&format!("sess-{}", n), title))
        }
        async fn update_session(&self, session_id: &str, update: &SessionUpdate) -> Option<ConversationSession> {
            let title = update.title.clone().unwrap_or_default();
            self.hit().then(|| Self::session(session_id, &title))
        }
        async fn clear_session(&self, _session_id: &str) -> bool {
            self.hit()
        }
        async fn delete_session(&self, _session_id: &str) -> bool {
            self.hit()
        }
        async fn send_message(
            &self,
            text: &str,
            _session_id: &str,
            _chain_id: u64,
            _contract_address: Option<&Address>,
        ) -> Option<AiResponse> {
            self.hit().then(|| AiResponse {
                message: Some(format!("echo: {}", text)),
                ..Default::default()
            })
        }
        async fn execute_command(&self, _intent: &ExecutionIntent) -> Option<AiResponse> {
            None
        }
    }

    fn manager() -> (Arc<FakeAi>, SessionManager) {
        let ai = Arc::new(FakeAi::default());
        (ai.clone(), SessionManager::new(ai, 88888))
    }

    #[tokio::test]
    async fn test_operations_without_session_fail_fast() {
        let (ai, mut manager) = manager();
        assert_eq!(manager.send_message("hi", None).await.unwrap_err(), SessionError::NoSession);
        assert_eq!(manager.clear().await.unwrap_err(), SessionError::NoSession);
        assert_eq!(manager.delete().await.unwrap_err(), SessionError::NoSession);
        assert_eq!(
            manager.update_session(&SessionUpdate::default()).await.unwrap_err(),
            SessionError::NoSession
        );
        assert_eq!(ai.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let (_ai, mut manager) = manager();
        let session = manager.create_session("Fan tokens").await.unwrap();
        assert_eq!(manager.state(), &SessionState::Active(session.clone()));

        let reply = manager.send_message("hello", None).await.unwrap();
        assert_eq!(reply.message.as_deref(), Some("echo: hello"));

        manager.clear().await.unwrap();
        assert!(matches!(manager.state(), SessionState::Cleared(_)));
        assert_eq!(manager.session_id(), Some(session.session_id.as_str()));

        manager.send_message("again", None).await.unwrap();
        assert!(matches!(manager.state(), SessionState::Active(_)));

        manager.delete().await.unwrap();
        assert_eq!(manager.state(), &SessionState::Deleted);
        assert_eq!(manager.send_message("late", None).await.unwrap_err(), SessionError::NoSession);
    }

    #[tokio::test]
    async fn test_update_keeps_session_id() {
        let (_ai, mut manager) = manager();
        let session = manager.create_session("").await.unwrap();
        assert_eq!(session.title, DEFAULT_SESSION_TITLE);

        let update = SessionUpdate {
            title: Some("Renamed".into()),
            is_public: None,
        };
        let updated = manager.update_session(&update).await.unwrap();
        assert_eq!(updated.session_id, session.session_id);
        assert_eq!(updated.title, "Renamed");
    }

    #[tokio::test]
    async fn test_upstream_failure_keeps_state() {
        let (ai, mut manager) = manager();
        manager.create_session("t").await.unwrap();
        ai.offline.store(true, Ordering::SeqCst);

        assert_eq!(
            manager.delete().await.unwrap_err(),
            SessionError::Unavailable("delete the conversation")
        );
        assert!(matches!(manager.state(), SessionState::Active(_)));
    }

    #[tokio::test]
    async fn test_activity_resets_idle_clock() {
        let (ai, mut manager) = manager();
        manager.create_session("t").await.unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(manager.idle_for() >= Duration::from_millis(20));

        manager.send_message("hi", None).await.unwrap();
        assert!(manager.idle_for() < Duration::from_millis(20));

        // Failed calls don't count as activity
        std::thread::sleep(Duration::from_millis(20));
        ai.offline.store(true, Ordering::SeqCst);
        assert!(manager.send_message("hi", None).await.is_err());
        assert!(manager.idle_for() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_ensure_session_creates_once() {
        let (ai, mut manager) = manager();
        let first = manager.ensure_session().await.unwrap();
        let second = manager.ensure_session().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(ai.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execution_intent_requires_session() {
        let (_ai, mut manager) = manager();
        let signer = Address::parse("0x90f8bf6a479f320ead074411a4b0e7944ea8c9c1").unwrap();
        assert_eq!(
            manager.execution_intent("send 1 CHZ", signer.clone(), None).unwrap_err(),
            SessionError::NoSession
        );

        let session = manager.create_session("t").await.unwrap();
        let intent = manager.execution_intent(" send 1 CHZ ", signer, None).unwrap();
        assert_eq!(intent.command, "send 1 CHZ");
        assert_eq!(intent.chain_id, 88888);
        assert_eq!(intent.session_id, session.session_id);
    }
}
