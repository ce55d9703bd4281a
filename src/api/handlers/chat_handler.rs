use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;

use crate::{
    api::{app_state::AppState, dto::chat_dto::*},
    error::AppError,
};

pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    debug!(
        "Chat request for thread {:?} (user {:?})",
        request.thread_id, request.user_id
    );

    if request.message.trim().is_empty() {
        return Err(AppError::Validation("Message cannot be empty".to_string()));
    }

    let reply = state
        .agent
        .chat(&request.message, request.overrides())
        .await?;

    Ok(Json(ChatResponse::from(reply)))
}

pub async fn get_thread_messages(
    State(state): State<AppState>,
    Path((user_id, thread_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    debug!("Listing messages for {}/{}", user_id, thread_id);

    let messages = state.agent.history(&user_id, &thread_id).await;
    let total = messages.len();

    Ok(Json(ThreadMessagesResponse {
        user_id,
        thread_id,
        messages,
        total,
    }))
}

pub async fn clear_thread(
    State(state): State<AppState>,
    Path((user_id, thread_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    debug!("Clearing thread {}/{}", user_id, thread_id);

    if state.agent.clear_thread(&user_id, &thread_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!(
            "Thread {}/{}",
            user_id, thread_id
        )))
    }
}
