pub mod config;
pub mod exec;
pub mod manifest;
pub mod session;
pub mod util;
pub mod web;

pub use config::Config;
pub use exec::{
    ExecError, ExecEvent, ExecRequest, ExecStatus, Executable, ExecutableRegistry,
    ExecutionEngine,
};
pub use manifest::{
    apply_diff, build_manifest_from_directory, compute_diff, hash_file_content,
    render_with_manifest, DiffResult, ManifestEntry, ManifestError, ManifestStore,
    TemplateManifest,
};
pub use session::{SessionError, SessionExecContext, SessionManager, SessionMetadata};
pub use web::{build_router, run_server, AppState};
