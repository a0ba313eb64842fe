/// Errors raised before a script starts running.
///
/// Non-zero exits and timeouts are not errors; they are reported through
/// [`ExecEvent::Status`](super::ExecEvent::Status).
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// The request is malformed (empty script, missing executable id)
    #[error("invalid request: {0}")]
    Validation(String),

    /// No executable registered under this id
    #[error("executable not found: {0}")]
    NotFound(String),

    /// Temp file setup failed
    #[error("failed to prepare script: {0}")]
    Io(#[from] std::io::Error),

    /// The interpreter could not be started
    #[error("failed to start {interpreter}: {source}")]
    Spawn {
        interpreter: String,
        #[source]
        source: std::io::Error,
    },

    /// stdout or stderr was not piped
    #[error("failed to capture {0}")]
    PipeUnavailable(&'static str),
}
