//! Axum route handlers for the Session API.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::session::controller::TurnOutcome;
use crate::session::SessionView;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitMessageRequest {
    pub content: String,
}

/// POST /api/v1/sessions
///
/// Loads the profile context and returns the seeded conversation.
pub async fn handle_create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let view = state.sessions.create_session().await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/v1/sessions/:id
///
/// Returns 409 instead of waiting while a turn is running.
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.sessions.get_session(id).await?))
}

/// POST /api/v1/sessions/:id/messages
///
/// Runs one chat turn. Returns 409 while a previous turn is still running.
/// The turn finishes even if the client goes away.
pub async fn handle_submit_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitMessageRequest>,
) -> Result<Json<TurnOutcome>, AppError> {
    Ok(Json(state.sessions.submit(id, &request.content).await?))
}

/// GET /api/v1/sessions/:id/audio
///
/// Audio of the latest reply, if synthesis succeeded.
pub async fn handle_latest_audio(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let audio = state.sessions.latest_audio(id).await?;
    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_end_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sessions.end_session(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/profile
///
/// Who the assistant speaks for; used by the client for titles and placeholders.
pub async fn handle_profile_info(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "owner": state.config.owner_name,
        "github_username": state.config.github_username,
        "title": format!("Chat with {}'s AI Assistant", state.config.github_username),
        "input_placeholder": format!("Ask about {}...", state.config.github_username),
    }))
}
