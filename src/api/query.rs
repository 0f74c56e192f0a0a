use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use super::{validate_body, ApiError};
use crate::{engine::QueryAnswer, AppState};

#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    /// Address, transaction hash, token symbol or `compare A and B`
    #[validate(length(min = 1, max = 2000))]
    pub input: String,
}

/// Answers one input without a conversation. Free text gets the
/// not-found message since there is no AI session to route it to.
pub async fn query_handler(
    State(state): State<AppState>,
    Json(input): Json<QueryRequest>,
) -> Result<Json<QueryAnswer>, ApiError> {
    validate_body(&input)?;
    let answer = state.engine.answer(&input.input).await;
    info!(kind = answer.kind, found = answer.result.is_some(), "Answered query");
    Ok(Json(answer))
}
