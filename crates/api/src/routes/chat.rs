//! Chat route handlers.
//!
//! Each request runs one conversation turn through the
//! [`Agent`](crate::agent::Agent). History lives server-side keyed by thread
//! id, so clients only send the new message.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};

use shopchat_core::ThreadId;

use crate::error::{AppError, Result};
use crate::state::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Request to send a chat message.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

impl ChatRequest {
    fn validated(&self) -> Result<&str> {
        let message = self.message.trim();
        if message.is_empty() {
            return Err(AppError::BadRequest("message must not be empty".to_string()));
        }
        Ok(message)
    }
}

/// Response for a new conversation.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChatResponse {
    pub thread_id: String,
    pub response: String,
}

/// Response for a continued conversation.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Start a new conversation.
///
/// POST /chat
pub async fn start(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Result<Json<NewChatResponse>> {
    let message = request.validated()?;
    let thread_id = ThreadId::generate();
    tracing::info!(%thread_id, "starting conversation");

    let response = state.agent().respond(&thread_id, message).await?;

    Ok(Json(NewChatResponse {
        thread_id: thread_id.to_string(),
        response,
    }))
}

/// Continue an existing conversation.
///
/// POST /chat/{thread_id}
///
/// Unknown thread ids start from an empty history.
pub async fn continue_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let thread_id = ThreadId::parse(thread_id).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let message = request.validated()?;

    let response = state.agent().respond(&thread_id, message).await?;

    Ok(Json(ChatResponse { response }))
}
