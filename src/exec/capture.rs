//! Environment capture for shell-compatible scripts
//!
//! The user script is embedded in a bash wrapper that dumps `env -0` and
//! `pwd` to two files when the shell exits. Scripts are free to register
//! their own EXIT traps: a `trap` function shadows the builtin, remembers
//! the user's EXIT handler, and the wrapper's own handler runs it before
//! taking the snapshot.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::is_valid_env_key;

/// Shell variable holding the env dump path inside the wrapper
pub const ENV_DUMP_VAR: &str = "__RUNBOOKS_ENV_DUMP";
/// Shell variable holding the pwd dump path inside the wrapper
pub const PWD_DUMP_VAR: &str = "__RUNBOOKS_PWD_DUMP";

const SCRIPT_BEGIN_MARKER: &str = "# ---- runbook script begin ----";
const SCRIPT_END_MARKER: &str = "# ---- runbook script end ----";

/// Quote `value` as a single-quoted POSIX shell literal.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Wrap `script` so that its final environment and working directory are
/// written to `env_path` and `pwd_path` on exit.
pub fn wrap_script_for_env_capture(script: &str, env_path: &Path, pwd_path: &Path) -> String {
    let env_path = shell_quote(&env_path.to_string_lossy());
    let pwd_path = shell_quote(&pwd_path.to_string_lossy());

    format!(
        r#"#!/bin/bash
{ENV_DUMP_VAR}={env_path}
{PWD_DUMP_VAR}={pwd_path}
__runbooks_saved_exit_handler=""

__runbooks_snapshot() {{
    env -0 > "${ENV_DUMP_VAR}" 2>/dev/null
    pwd > "${PWD_DUMP_VAR}" 2>/dev/null
}}

trap() {{
    if [[ "$1" == "-p" || "$1" == "-l" ]]; then
        builtin trap "$@"
        return $?
    fi

    local -a args=("$@")
    if [[ "${{args[0]-}}" == "--" ]]; then
        args=("${{args[@]:1}}")
    fi

    local arg
    local names_exit=false
    for arg in "${{args[@]}}"; do
        if [[ "$arg" == "EXIT" || "$arg" == "0" ]]; then
            names_exit=true
            break
        fi
    done

    if $names_exit && [[ ${{#args[@]}} -ge 2 ]]; then
        if [[ "${{args[0]-}}" == "-" || -z "${{args[0]-}}" ]]; then
            __runbooks_saved_exit_handler=""
        else
            __runbooks_saved_exit_handler="${{args[0]-}}"
        fi
        return 0
    fi

    builtin trap "$@"
}}

__runbooks_on_exit() {{
    local exit_code=$?
    if [[ -n "$__runbooks_saved_exit_handler" ]]; then
        eval "$__runbooks_saved_exit_handler" || true
    fi
    __runbooks_snapshot
    exit $exit_code
}}

builtin trap __runbooks_on_exit EXIT

{SCRIPT_BEGIN_MARKER}
{script}
{SCRIPT_END_MARKER}
"#
    )
}

/// Result of reading the two dump files after a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvCapture {
    /// `None` when nothing was captured (missing or empty dump)
    pub env: Option<HashMap<String, String>>,
    /// Trimmed working directory, empty when not captured
    pub pwd: String,
}

/// Read and parse the env and pwd dumps.
///
/// Missing files are expected when a script dies before its EXIT handler
/// runs and are not reported. Other read errors are logged.
pub fn parse_env_capture(env_path: &Path, pwd_path: &Path) -> EnvCapture {
    let env = read_dump(env_path)
        .map(|data| parse_env_dump(&String::from_utf8_lossy(&data)))
        .filter(|env| !env.is_empty());

    let pwd = read_dump(pwd_path)
        .map(|data| String::from_utf8_lossy(&data).trim().to_string())
        .unwrap_or_default();

    EnvCapture { env, pwd }
}

fn read_dump(path: &Path) -> Option<Vec<u8>> {
    match fs::read(path) {
        Ok(data) => Some(data),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read capture file");
            None
        }
    }
}

/// Parse an environment dump. NUL-separated input (from `env -0`) is split
/// on NUL; otherwise lines are read with continuation handling so multi-line
/// values survive.
pub fn parse_env_dump(data: &str) -> HashMap<String, String> {
    if data.contains('\0') {
        parse_nul_separated(data)
    } else {
        parse_newline_separated(data)
    }
}

fn parse_nul_separated(data: &str) -> HashMap<String, String> {
    data.split('\0')
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let (key, value) = entry.split_once('=')?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

fn parse_newline_separated(data: &str) -> HashMap<String, String> {
    let mut env = HashMap::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in data.split('\n') {
        let starts_pair = line
            .split_once('=')
            .filter(|(key, _)| is_valid_env_key(key));

        match starts_pair {
            Some((key, value)) => {
                if let Some((key, lines)) = current.take() {
                    env.insert(key, lines.join("\n"));
                }
                current = Some((key.to_string(), vec![value]));
            }
            None if !line.is_empty() => {
                if let Some((_, lines)) = current.as_mut() {
                    lines.push(line);
                }
            }
            None => {}
        }
    }

    if let Some((key, lines)) = current {
        env.insert(key, lines.join("\n"));
    }
    env
}

/// The pair of temp files a wrapped script dumps into
#[derive(Debug)]
pub struct CaptureFiles {
    env: tempfile::TempPath,
    pwd: tempfile::TempPath,
}

impl CaptureFiles {
    /// Create both files. They are removed when this value is dropped.
    pub fn create() -> io::Result<Self> {
        let env = tempfile::Builder::new()
            .prefix("runbooks-env-")
            .tempfile()?
            .into_temp_path();
        let pwd = tempfile::Builder::new()
            .prefix("runbooks-pwd-")
            .tempfile()?
            .into_temp_path();
        Ok(Self { env, pwd })
    }

    pub fn env_path(&self) -> &Path {
        &self.env
    }

    pub fn pwd_path(&self) -> &Path {
        &self.pwd
    }

    pub fn paths(&self) -> (PathBuf, PathBuf) {
        (self.env.to_path_buf(), self.pwd.to_path_buf())
    }

    pub fn parse(&self) -> EnvCapture {
        parse_env_capture(&self.env, &self.pwd)
    }
}
