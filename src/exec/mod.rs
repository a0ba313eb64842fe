//! Script execution
//!
//! Runs runbook scripts as child processes against the session's
//! environment, streams their output as [`ExecEvent`]s, and feeds
//! environment changes, named outputs, and generated files back to the
//! caller.

pub mod capture;
mod engine;
mod error;
mod events;
pub mod files;
pub mod interpreter;
pub mod outputs;
mod registry;
mod script;

use std::sync::LazyLock;

use regex::Regex;

pub use capture::{parse_env_capture, wrap_script_for_env_capture, EnvCapture};
pub use engine::{ExecRequest, ExecutionEngine, DEFAULT_EXEC_TIMEOUT};
pub use error::ExecError;
pub use events::{CapturedFile, ExecEvent, ExecStatus};
pub use interpreter::{detect_interpreter, is_shell_compatible, Interpreter};
pub use registry::{extract_template_vars, render_template_vars, Executable, ExecutableRegistry};

/// Env var pointing scripts at their named-outputs file
pub const OUTPUT_FILE_ENV: &str = "RUNBOOK_OUTPUT";
/// Env var pointing scripts at their file-capture directory
pub const FILES_DIR_ENV: &str = "RUNBOOK_FILES";

static ENV_KEY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok());

/// Whether `key` is a valid shell variable name.
pub(crate) fn is_valid_env_key(key: &str) -> bool {
    ENV_KEY.as_ref().is_some_and(|re| re.is_match(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_env_key() {
        for key in ["FOO", "_private", "a1_B2", "_"] {
            assert!(is_valid_env_key(key), "{key}");
        }
        for key in ["", "1ABC", "FOO-BAR", "FOO BAR", "FÖO", "A="] {
            assert!(!is_valid_env_key(key), "{key}");
        }
    }
}
