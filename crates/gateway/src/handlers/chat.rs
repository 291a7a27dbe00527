//! Chat handler - one grounded answer per request

use crate::AppState;
use axum::{extract::State, Json};
use fingraph_common::{
    context::ChatMessage,
    errors::{AppError, Result},
    ChatReply,
};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 4000))]
    pub message: String,

    /// Prior turns, oldest first
    #[serde(default)]
    #[validate(length(max = 50), nested)]
    pub history: Vec<ChatMessage>,
}

pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let reply = state
        .pipeline
        .handle_query(&request.message, &request.history)
        .await?;

    tracing::info!(
        used_kg = reply.used_kg,
        sources = reply.sources.len(),
        "Chat reply sent"
    );

    Ok(Json(reply))
}
