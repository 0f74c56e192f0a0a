//! # AI Module
//!
//! Client for the conversational AI service that answers free-text questions
//! and turns execute commands into unsigned transactions.
//!
//! ## Endpoints
//! - `POST /session`, `PUT /session/{id}`, `POST /session/{id}/clear`, `DELETE /session/{id}`
//! - `POST /chat` - one conversational turn
//! - `POST /execute` - a command that should produce a `sign_transaction` action

pub mod client;
pub mod models;

pub use client::{AiClient, AiSource};
pub use models::{AiAction, AiResponse, ConversationSession, ExecutionIntent, SessionUpdate, Visibility};
