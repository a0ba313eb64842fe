use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;

use super::env::{capture_environment, env_slice};
use super::error::SessionError;

/// Default cap on concurrent tokens (browser tabs) per session
pub const DEFAULT_MAX_TOKENS_PER_SESSION: usize = 20;

#[derive(Debug, Clone)]
struct IssuedToken {
    token: String,
    issued_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Session {
    /// Issue order, oldest first
    tokens: VecDeque<IssuedToken>,
    env: HashMap<String, String>,
    working_dir: PathBuf,
    initial_env: HashMap<String, String>,
    initial_working_dir: PathBuf,
    execution_count: u64,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl Session {
    fn has_token(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t.token == token)
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            env: self.env.clone(),
            working_dir: self.working_dir.clone(),
            execution_count: self.execution_count,
            created_at: self.created_at,
            last_activity: self.last_activity,
        }
    }
}

/// Independent copy of session state, taken under the lock.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub env: HashMap<String, String>,
    pub working_dir: PathBuf,
    pub execution_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn exec_context(&self) -> SessionExecContext {
        SessionExecContext {
            env: env_slice(&self.env),
            work_dir: self.working_dir.clone(),
        }
    }
}

/// What a script run needs from the session: `KEY=VALUE` pairs and a cwd.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionExecContext {
    pub env: Vec<String>,
    pub work_dir: PathBuf,
}

/// Public view of the session. Never carries tokens or environment values.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub working_dir: PathBuf,
    pub execution_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub active_tabs: usize,
}

/// Owns the single active session and its token set.
#[derive(Debug)]
pub struct SessionManager {
    session: Mutex<Option<Session>>,
    max_tokens: usize,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

impl SessionManager {
    pub fn new() -> Self {
        Self::with_max_tokens(DEFAULT_MAX_TOKENS_PER_SESSION)
    }

    pub fn with_max_tokens(max_tokens: usize) -> Self {
        Self {
            session: Mutex::new(None),
            max_tokens: max_tokens.max(1),
        }
    }

    /// Start a fresh session rooted at `working_dir`, replacing any existing
    /// one. Returns the first token.
    pub fn create_session(&self, working_dir: &Path) -> Result<String, SessionError> {
        let working_dir =
            std::path::absolute(working_dir).map_err(|source| SessionError::WorkingDir {
                path: working_dir.to_path_buf(),
                source,
            })?;

        let env = capture_environment();
        let now = Utc::now();
        let token = generate_token();

        let session = Session {
            tokens: VecDeque::from([IssuedToken {
                token: token.clone(),
                issued_at: now,
            }]),
            initial_env: env.clone(),
            env,
            initial_working_dir: working_dir.clone(),
            working_dir: working_dir.clone(),
            execution_count: 0,
            created_at: now,
            last_activity: now,
        };

        let replaced = self.session.lock().replace(session).is_some();
        tracing::info!(
            working_dir = %working_dir.display(),
            replaced,
            "Created session"
        );

        Ok(token)
    }

    /// Mint an additional token for the existing session. Returns `None` when
    /// there is no session to join.
    pub fn join_session(&self) -> Option<String> {
        let mut guard = self.session.lock();
        let session = guard.as_mut()?;

        while session.tokens.len() >= self.max_tokens {
            if let Some(evicted) = session.tokens.pop_front() {
                tracing::debug!(
                    issued_at = %evicted.issued_at,
                    "Evicted oldest session token"
                );
            }
        }

        let token = generate_token();
        let now = Utc::now();
        session.tokens.push_back(IssuedToken {
            token: token.clone(),
            issued_at: now,
        });
        session.last_activity = now;

        Some(token)
    }

    /// Look up the session a token belongs to.
    pub fn validate_token(&self, token: &str) -> Option<SessionSnapshot> {
        let guard = self.session.lock();
        let session = guard.as_ref()?;
        session.has_token(token).then(|| session.snapshot())
    }

    /// Remove a single token. The session survives while other tokens remain.
    pub fn revoke_token(&self, token: &str) -> bool {
        let mut guard = self.session.lock();
        let Some(session) = guard.as_mut() else {
            return false;
        };

        let before = session.tokens.len();
        session.tokens.retain(|t| t.token != token);
        session.tokens.len() != before
    }

    /// Merge a captured environment into the session and move its working
    /// directory. Keys absent from `new_env` keep their previous values.
    pub fn update_session_env(
        &self,
        new_env: HashMap<String, String>,
        new_work_dir: PathBuf,
    ) -> Result<(), SessionError> {
        let mut guard = self.session.lock();
        let session = guard.as_mut().ok_or(SessionError::NoSession)?;

        session.env.extend(new_env);
        session.working_dir = new_work_dir;
        session.execution_count += 1;
        session.last_activity = Utc::now();

        Ok(())
    }

    /// Restore env and working directory to their creation-time values.
    /// Tokens and the execution counter are left alone.
    pub fn reset_session(&self) -> Result<(), SessionError> {
        let mut guard = self.session.lock();
        let session = guard.as_mut().ok_or(SessionError::NoSession)?;

        session.env = session.initial_env.clone();
        session.working_dir = session.initial_working_dir.clone();
        session.last_activity = Utc::now();

        Ok(())
    }

    pub fn delete_session(&self) {
        if self.session.lock().take().is_some() {
            tracing::info!("Deleted session");
        }
    }

    pub fn metadata(&self) -> Option<SessionMetadata> {
        let guard = self.session.lock();
        let session = guard.as_ref()?;
        Some(SessionMetadata {
            working_dir: session.working_dir.clone(),
            execution_count: session.execution_count,
            created_at: session.created_at,
            last_activity: session.last_activity,
            active_tabs: session.tokens.len(),
        })
    }

    pub fn token_count(&self) -> usize {
        self.session
            .lock()
            .as_ref()
            .map(|s| s.tokens.len())
            .unwrap_or(0)
    }

    pub fn has_session(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Execution context for the current session, if any.
    pub fn exec_context(&self) -> Option<SessionExecContext> {
        let guard = self.session.lock();
        guard.as_ref().map(|s| s.snapshot().exec_context())
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }
}
