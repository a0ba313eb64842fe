//! HTTP transport over the session manager and execution engine.

mod auth;
mod error;
mod handlers;
mod routes;
mod server;
mod state;

pub use auth::{bearer_token, SessionAuth};
pub use error::WebError;
pub use server::{build_router, run_server};
pub use state::AppState;
