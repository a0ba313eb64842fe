//! Session lifecycle handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::session::SessionMetadata;
use crate::web::auth::SessionAuth;
use crate::web::error::WebError;
use crate::web::state::AppState;

/// Response carrying a freshly minted token.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Create a new session in the configured working directory, replacing any
/// existing one.
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<TokenResponse>), WebError> {
    let token = state.sessions.create_session(&state.config.working_dir)?;
    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}

/// Mint another token for the existing session (a new browser tab).
pub async fn join_session(
    State(state): State<AppState>,
) -> Result<Json<TokenResponse>, WebError> {
    let token = state
        .sessions
        .join_session()
        .ok_or_else(|| WebError::Unauthorized("No active session to join".to_string()))?;
    Ok(Json(TokenResponse { token }))
}

pub async fn get_session(
    State(state): State<AppState>,
    _auth: SessionAuth,
) -> Result<Json<SessionMetadata>, WebError> {
    current_metadata(&state).map(Json)
}

/// Restore the session's environment and working directory.
pub async fn reset_session(
    State(state): State<AppState>,
    _auth: SessionAuth,
) -> Result<Json<SessionMetadata>, WebError> {
    state.sessions.reset_session()?;
    current_metadata(&state).map(Json)
}

/// Delete the session, invalidating every token.
pub async fn delete_session(State(state): State<AppState>, _auth: SessionAuth) -> StatusCode {
    state.sessions.delete_session();
    StatusCode::NO_CONTENT
}

/// Revoke only the caller's token.
pub async fn revoke_token(State(state): State<AppState>, auth: SessionAuth) -> StatusCode {
    state.sessions.revoke_token(&auth.token);
    StatusCode::NO_CONTENT
}

fn current_metadata(state: &AppState) -> Result<SessionMetadata, WebError> {
    state
        .sessions
        .metadata()
        .ok_or_else(|| WebError::NotFound("No active session".to_string()))
}
