//! Shared state handed to every request handler.

use std::sync::Arc;

use crate::config::Config;
use crate::exec::{ExecutableRegistry, ExecutionEngine};
use crate::session::SessionManager;

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionManager>,
    pub engine: ExecutionEngine,
    pub executables: Arc<ExecutableRegistry>,
}

impl AppState {
    /// Build state from configuration with an empty executable registry.
    pub fn new(config: Config) -> Self {
        Self::with_executables(config, Arc::new(ExecutableRegistry::new()))
    }

    pub fn with_executables(config: Config, executables: Arc<ExecutableRegistry>) -> Self {
        let sessions = Arc::new(SessionManager::with_max_tokens(config.session.max_tokens));
        let engine = ExecutionEngine::new(sessions.clone()).with_timeout(config.exec.timeout);
        Self {
            config: Arc::new(config),
            sessions,
            engine,
            executables,
        }
    }
}
