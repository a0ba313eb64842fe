//! Bearer-token extraction for session-scoped routes.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::error::WebError;
use super::state::AppState;
use crate::session::SessionSnapshot;

/// Extract the token from an `Authorization` header value. The scheme is
/// matched case-insensitively.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let mut parts = header_value.split_whitespace();
    let scheme = parts.next()?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some(token)
}

/// A request carrying a valid session token.
///
/// The snapshot is taken when the request is accepted; a long-running exec
/// keeps using it even if the session changes meanwhile.
#[derive(Debug, Clone)]
pub struct SessionAuth {
    pub token: String,
    pub session: SessionSnapshot,
}

impl FromRequestParts<AppState> for SessionAuth {
    type Rejection = WebError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| WebError::Unauthorized("Missing Authorization header".to_string()))?;

        let token = bearer_token(header).ok_or_else(|| {
            WebError::Unauthorized("Expected Authorization: Bearer <token>".to_string())
        })?;

        let session = state.sessions.validate_token(token).ok_or_else(|| {
            WebError::Unauthorized("Invalid or expired session token".to_string())
        })?;

        Ok(Self {
            token: token.to_string(),
            session,
        })
    }
}
