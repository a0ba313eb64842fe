use std::path::PathBuf;

/// Errors from manifest building and reconciliation
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// A diff path is absolute, empty, or climbs out with `..`
    #[error("unsafe path in {category} list: {path:?} ({reason})")]
    UnsafePath {
        category: &'static str,
        path: String,
        reason: &'static str,
    },

    /// A resolved destination fell outside the output directory
    #[error("path escapes output directory: {0}")]
    EscapesOutputDir(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("render failed: {0}")]
    Render(#[source] anyhow::Error),
}

impl ManifestError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ManifestError::Io {
            path: path.into(),
            source,
        }
    }
}
