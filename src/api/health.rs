use axum::{extract::State, response::IntoResponse, Json};

use crate::AppState;

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "chain_id": state.config.chain_id,
        "open_conversations": state.conversations.len(),
        "headless_signer": state.signer.is_some(),
    }))
}
