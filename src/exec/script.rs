use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::{TempDir, TempPath};

use super::capture::{wrap_script_for_env_capture, CaptureFiles};
use super::interpreter::{detect_interpreter, Interpreter};

/// A script written to disk and ready to spawn.
///
/// Owns every temp file for one run; dropping it removes them.
#[derive(Debug)]
pub(crate) struct ScriptSetup {
    pub interpreter: Interpreter,
    script: TempPath,
    /// Present only for shell-compatible scripts
    capture: Option<CaptureFiles>,
}

impl ScriptSetup {
    /// Detect the interpreter, wrap shell scripts for environment capture,
    /// and write the result to a private executable file.
    pub fn prepare(script: &str, language: Option<&str>) -> io::Result<Self> {
        let interpreter = detect_interpreter(script, language);

        let (capture, content) = if interpreter.is_shell_compatible() {
            let capture = CaptureFiles::create()?;
            let wrapped =
                wrap_script_for_env_capture(script, capture.env_path(), capture.pwd_path());
            (Some(capture), wrapped)
        } else {
            (None, script.to_string())
        };

        let mut file = tempfile::Builder::new()
            .prefix("runbook-script-")
            .suffix(".sh")
            .tempfile()?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
        set_owner_only_executable(file.path())?;

        Ok(Self {
            interpreter,
            script: file.into_temp_path(),
            capture,
        })
    }

    pub fn script_path(&self) -> &Path {
        &self.script
    }

    pub fn capture(&self) -> Option<&CaptureFiles> {
        self.capture.as_ref()
    }

    /// Program and arguments to spawn. Wrapped scripts always run under
    /// bash since the wrapper uses bash syntax.
    pub fn command_line(&self) -> (PathBuf, Vec<String>) {
        let mut interpreter = self.interpreter.clone();
        if self.capture.is_some() && interpreter.program.rsplit('/').next() == Some("sh") {
            interpreter.program = "bash".to_string();
        }
        (interpreter.resolve_program(), interpreter.args)
    }
}

#[cfg(unix)]
fn set_owner_only_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn set_owner_only_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Per-run scratch space exposed to the script through env vars.
#[derive(Debug)]
pub(crate) struct RunScratch {
    pub outputs: TempPath,
    pub files_dir: Option<TempDir>,
}

impl RunScratch {
    pub fn create(capture_files: bool) -> io::Result<Self> {
        let outputs = tempfile::Builder::new()
            .prefix("runbook-output-")
            .suffix(".txt")
            .tempfile()?
            .into_temp_path();

        let files_dir = if capture_files {
            Some(tempfile::Builder::new().prefix("runbook-files-").tempdir()?)
        } else {
            None
        };

        Ok(Self { outputs, files_dir })
    }
}
