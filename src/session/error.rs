use std::path::PathBuf;

/// Errors from session lifecycle operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no active session")]
    NoSession,

    #[error("failed to resolve working directory {path}: {source}")]
    WorkingDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
