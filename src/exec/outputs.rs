//! Named outputs written by scripts to `$RUNBOOK_OUTPUT`

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use super::is_valid_env_key;

/// Parse `key=value` lines. Blank lines are skipped, malformed lines are
/// logged and skipped. Values keep their surrounding whitespace.
pub fn parse_outputs(content: &str) -> HashMap<String, String> {
    let mut outputs = HashMap::new();

    for (index, raw) in content.split('\n').enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            tracing::warn!(line = index + 1, content = %line, "Ignoring output line without '='");
            continue;
        };

        let key = key.trim();
        if !is_valid_env_key(key) {
            tracing::warn!(line = index + 1, key = %key, "Ignoring output with invalid key");
            continue;
        }

        outputs.insert(key.to_string(), value.to_string());
    }

    outputs
}

/// Read and parse an outputs file. A missing file means no outputs.
pub fn read_outputs(path: &Path) -> io::Result<HashMap<String, String>> {
    match fs::read(path) {
        Ok(content) => Ok(parse_outputs(&String::from_utf8_lossy(&content))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(e),
    }
}
