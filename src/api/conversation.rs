use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use validator::Validate;

use super::{validate_body, ApiError};
use crate::{
    ai::models::{AiAction, ConversationSession, SessionUpdate},
    blockchain::models::Address,
    engine::{
        session::DEFAULT_SESSION_TITLE, ClassifiedInput, ExecutionState, ExecutionUpdate,
        QueryResult, SessionError, SessionManager,
    },
    utils::validate_address,
    AppState,
};

// --- Request and Response Models ---

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CreateConversationRequest {
    #[validate(length(max = 200))]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateConversationRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MessageRequest {
    #[validate(length(min = 1, max = 4000))]
    pub message: String,
    /// Narrows the AI's context to one contract
    #[validate(custom = "validate_address")]
    pub contract_address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub session_id: String,
    /// Classification of the message; `free_text` means the AI answered.
    pub kind: &'static str,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<QueryResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<AiAction>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ExecuteRequest {
    #[validate(length(min = 1, max = 2000))]
    pub command: String,
    #[validate(custom = "validate_address")]
    pub signer_address: String,
    #[validate(custom = "validate_address")]
    pub contract_address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub session_id: String,
    pub execution: ExecutionState,
    pub message: String,
    /// Every status update emitted along the way, in order
    pub updates: Vec<ExecutionUpdate>,
}

#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub session_id: String,
    pub status: &'static str,
}

// --- Helpers ---

fn session_error(e: SessionError) -> ApiError {
    let status = match e {
        SessionError::NoSession => StatusCode::NOT_FOUND,
        SessionError::Unavailable(_) => StatusCode::BAD_GATEWAY,
    };
    (status, e.to_string())
}

fn find_conversation(state: &AppState, session_id: &str) -> Result<Arc<Mutex<SessionManager>>, ApiError> {
    state
        .conversation(session_id)
        .ok_or_else(|| session_error(SessionError::NoSession))
}

/// Already validated by `validate_address`.
fn parse_address(value: Option<&str>) -> Option<Address> {
    value.and_then(Address::parse)
}

// --- Handlers ---

/// Start a new conversation with the AI service
pub async fn create_conversation_handler(
    State(state): State<AppState>,
    body: Option<Json<CreateConversationRequest>>,
) -> Result<(StatusCode, Json<ConversationSession>), ApiError> {
    let Json(input) = body.unwrap_or_default();
    validate_body(&input)?;

    if state.conversations.len() >= state.config.max_conversations {
        let evicted = state.evict_idle_conversations(state.config.conversation_idle());
        if evicted == 0 {
            warn!(open = state.conversations.len(), "Conversation limit reached");
            return Err((
                StatusCode::SERVICE_UNAVAILABLE,
                "Too many open conversations. Try again later.".to_string(),
            ));
        }
    }

    let mut manager = state.new_session_manager();
    let title = input.title.as_deref().unwrap_or(DEFAULT_SESSION_TITLE);
    let session = manager.create_session(title).await.map_err(|e| {
        error!("Failed to create conversation: {}", e);
        session_error(e)
    })?;

    state
        .conversations
        .insert(session.session_id.clone(), Arc::new(Mutex::new(manager)));
    info!(session_id = %session.session_id, "Opened conversation");
    Ok((StatusCode::CREATED, Json(session)))
}

/// Rename a conversation or change its visibility
pub async fn update_conversation_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(input): Json<UpdateConversationRequest>,
) -> Result<Json<ConversationSession>, ApiError> {
    validate_body(&input)?;
    let conversation = find_conversation(&state, &session_id)?;
    let update = SessionUpdate {
        title: input.title,
        is_public: input.is_public,
    };
    let session = conversation
        .lock()
        .await
        .update_session(&update)
        .await
        .map_err(session_error)?;
    Ok(Json(session))
}

/// One conversational turn. Addresses, hashes and token references are
/// answered by the engine; everything else goes to the AI session.
pub async fn send_message_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(input): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    validate_body(&input)?;
    let conversation = find_conversation(&state, &session_id)?;
    // Held for the whole turn: one in-flight message per session.
    let mut manager = conversation.lock().await;
    let session_id = manager
        .session_id()
        .ok_or_else(|| session_error(SessionError::NoSession))?
        .to_string();

    let classified = state.engine.classify(&input.message);
    if let ClassifiedInput::FreeText(text) = &classified {
        let contract = parse_address(input.contract_address.as_deref());
        let reply = manager
            .send_message(text, contract.as_ref())
            .await
            .map_err(session_error)?;
        return Ok(Json(MessageResponse {
            session_id,
            kind: classified.kind(),
            text: reply.message.unwrap_or_default(),
            result: None,
            actions: reply.actions,
        }));
    }

    let answer = state.engine.answer_classified(&classified, &input.message).await;
    Ok(Json(MessageResponse {
        session_id,
        kind: answer.kind,
        text: answer.text,
        result: answer.result,
        actions: Vec::new(),
    }))
}

/// Reset the upstream context; the id stays usable
pub async fn clear_conversation_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    let conversation = find_conversation(&state, &session_id)?;
    conversation.lock().await.clear().await.map_err(session_error)?;
    Ok(Json(SessionStatusResponse {
        session_id,
        status: "cleared",
    }))
}

pub async fn delete_conversation_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    let conversation = find_conversation(&state, &session_id)?;
    conversation.lock().await.delete().await.map_err(session_error)?;
    state.conversations.remove(&session_id);
    info!(session_id = %session_id, "Closed conversation");
    Ok(Json(SessionStatusResponse {
        session_id,
        status: "deleted",
    }))
}

/// Turn a natural-language command into a transaction. With a headless
/// signer configured the transaction is signed and confirmed here;
/// otherwise the response stops at `awaiting_signature` with the unsigned
/// descriptor for the caller's wallet.
pub async fn execute_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(input): Json<ExecuteRequest>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    validate_body(&input)?;
    let conversation = find_conversation(&state, &session_id)?;
    let manager = conversation.lock().await;

    let signer_address = Address::parse(&input.signer_address).ok_or_else(|| {
        (StatusCode::BAD_REQUEST, "Invalid signer_address".to_string())
    })?;
    let intent = manager
        .execution_intent(
            &input.command,
            signer_address,
            parse_address(input.contract_address.as_deref()),
        )
        .map_err(session_error)?;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let executor = state.executor().with_updates(tx);
    let execution = match &state.signer {
        Some(signer) => {
            executor
                .execute(&intent, signer.as_ref(), &CancellationToken::new())
                .await
        }
        None => executor.prepare(&intent).await,
    };
    drop(executor);

    let mut updates = Vec::new();
    while let Some(update) = rx.recv().await {
        updates.push(update);
    }

    Ok(Json(ExecuteResponse {
        session_id: intent.session_id,
        message: execution.status_message(),
        execution,
        updates,
    }))
}

/// Create the conversation router
pub fn create_conversation_router() -> Router<AppState> {
    Router::new()
        .route("/conversations", post(create_conversation_handler))
        .route(
            "/conversations/:session_id",
            put(update_conversation_handler).delete(delete_conversation_handler),
        )
        .route("/conversations/:session_id/messages", post(send_message_handler))
        .route("/conversations/:session_id/clear", post(clear_conversation_handler))
        .route("/conversations/:session_id/execute", post(execute_handler))
}
