//! Environment snapshots and post-capture filtering

use std::collections::HashMap;

use crate::exec::capture::{ENV_DUMP_VAR, PWD_DUMP_VAR};
use crate::exec::{FILES_DIR_ENV, OUTPUT_FILE_ENV};

/// Shell internals and per-run values that must not leak into the session.
const EXCLUDED_VARS: &[&str] = &[
    "_",
    "SHLVL",
    "OLDPWD",
    "FUNCNAME",
    "LINENO",
    "RANDOM",
    "SECONDS",
    "EPOCHSECONDS",
    "EPOCHREALTIME",
    "BASHPID",
    "PPID",
    "PIPESTATUS",
    "HISTCMD",
    "SRANDOM",
    ENV_DUMP_VAR,
    PWD_DUMP_VAR,
    OUTPUT_FILE_ENV,
    FILES_DIR_ENV,
];

/// Snapshot the server process environment.
///
/// Entries that are not valid UTF-8 are skipped.
pub fn capture_environment() -> HashMap<String, String> {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

/// Drop shell-internal variables from an environment captured after a run.
pub fn filter_captured_env(env: HashMap<String, String>) -> HashMap<String, String> {
    env.into_iter()
        .filter(|(key, _)| !is_excluded(key))
        .collect()
}

fn is_excluded(key: &str) -> bool {
    key.starts_with("BASH_") || EXCLUDED_VARS.contains(&key)
}

/// Render an environment map as sorted `KEY=VALUE` pairs.
pub fn env_slice(env: &HashMap<String, String>) -> Vec<String> {
    let mut pairs: Vec<String> = env.iter().map(|(k, v)| format!("{k}={v}")).collect();
    pairs.sort();
    pairs
}

/// Parse `KEY=VALUE` pairs back into a map, splitting on the first `=`.
/// Later duplicates win; entries without `=` are ignored.
pub fn parse_env_pairs<S: AsRef<str>>(pairs: &[S]) -> HashMap<String, String> {
    pairs
        .iter()
        .filter_map(|pair| {
            let (key, value) = pair.as_ref().split_once('=')?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}
