//! REST API route definitions.

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::web::handlers::{exec, session};
use crate::web::state::AppState;

/// Build the API router with all REST endpoints.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Session routes
        .route("/session", post(session::create_session))
        .route("/session", get(session::get_session))
        .route("/session", delete(session::delete_session))
        .route("/session/join", post(session::join_session))
        .route("/session/reset", post(session::reset_session))
        .route("/session/token", delete(session::revoke_token))
        // Execution
        .route("/exec", post(exec::execute_script))
}
