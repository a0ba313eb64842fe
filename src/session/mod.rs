//! Session management
//!
//! A single process-wide session shared by every browser tab that holds one
//! of its tokens. The session carries the environment and working directory
//! that script runs inherit and update.

pub mod env;
mod error;
mod manager;

pub use env::{capture_environment, env_slice, filter_captured_env, parse_env_pairs};
pub use error::SessionError;
pub use manager::{
    SessionExecContext, SessionManager, SessionMetadata, SessionSnapshot,
    DEFAULT_MAX_TOKENS_PER_SESSION,
};
