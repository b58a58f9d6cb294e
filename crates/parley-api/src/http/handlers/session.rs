//! Conversation management HTTP handlers.
//!
//! Endpoints:
//! - GET    /api/v1/ai/sessions       - List the caller's active conversations
//! - GET    /api/v1/ai/sessions/{uid} - Get a conversation with its messages
//! - PATCH  /api/v1/ai/sessions/{uid} - Rename a conversation
//! - DELETE /api/v1/ai/sessions/{uid} - Delete a conversation and its messages

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use uuid::Uuid;

use parley_types::chat::ConversationView;

use crate::http::error::AppError;
use crate::http::extractors::auth::Caller;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Request body for renaming a conversation.
#[derive(Debug, Deserialize)]
pub struct RenameBody {
    pub title: String,
}

fn session_link(uid: &str) -> String {
    format!("/api/v1/ai/sessions/{uid}")
}

/// GET /api/v1/ai/sessions - List the caller's conversations, newest first.
pub async fn list_sessions(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<ApiResponse<Vec<ConversationView>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let conversations = state
        .conversation_service
        .list_conversations(caller.user())
        .await?;
    let views: Vec<ConversationView> = conversations.iter().map(ConversationView::from).collect();

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(views, request_id, elapsed).with_link("self", "/api/v1/ai/sessions");
    Ok(Json(resp))
}

/// GET /api/v1/ai/sessions/{uid} - Get a conversation with its messages.
pub async fn get_session(
    State(state): State<AppState>,
    caller: Caller,
    Path(uid): Path<String>,
) -> Result<Json<ApiResponse<ConversationView>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let conversation = state
        .conversation_service
        .get_conversation(caller.user(), &uid)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(ConversationView::from(&conversation), request_id, elapsed)
        .with_link("self", &session_link(&uid));
    Ok(Json(resp))
}

/// PATCH /api/v1/ai/sessions/{uid} - Replace the title.
pub async fn rename_session(
    State(state): State<AppState>,
    caller: Caller,
    Path(uid): Path<String>,
    Json(body): Json<RenameBody>,
) -> Result<Json<ApiResponse<ConversationView>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let conversation = state
        .conversation_service
        .rename_conversation(caller.user(), &uid, &body.title)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(ConversationView::from(&conversation), request_id, elapsed)
        .with_link("self", &session_link(&uid));
    Ok(Json(resp))
}

/// DELETE /api/v1/ai/sessions/{uid} - Delete a conversation and its messages.
pub async fn delete_session(
    State(state): State<AppState>,
    caller: Caller,
    Path(uid): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    state
        .conversation_service
        .delete_conversation(caller.user(), &uid)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(
        serde_json::json!({ "deleted": true, "uid": uid }),
        request_id,
        elapsed,
    );
    Ok(Json(resp))
}
