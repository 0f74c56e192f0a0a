//! # API Module
//!
//! HTTP handlers for the Chiliz chat server, mounted under `/api`.
//!
//! ## Available Endpoints
//!
//! ### Queries
//! - `GET /health` - Liveness and configuration summary
//! - `POST /query` - Classify, resolve and format one input without a conversation
//!
//! ### Conversations
//! - `POST /conversations` - Start an AI conversation
//! - `PUT /conversations/:id` - Rename or change visibility
//! - `POST /conversations/:id/messages` - One turn; structured inputs are answered locally
//! - `POST /conversations/:id/clear` - Reset upstream context, keep the id
//! - `DELETE /conversations/:id` - Delete the conversation
//! - `POST /conversations/:id/execute` - Turn a command into a transaction

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use validator::Validate;

use crate::AppState;

pub mod conversation;
pub mod health;
pub mod query;

/// Error half of every handler result.
pub type ApiError = (StatusCode, String);

/// Runs `validator` rules on a request body.
pub(crate) fn validate_body<T: Validate>(body: &T) -> Result<(), ApiError> {
    body.validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid request: {}", e)))
}

/// All API routes, ready to be nested under `/api`.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/query", post(query::query_handler))
        .merge(conversation::create_conversation_router())
}
