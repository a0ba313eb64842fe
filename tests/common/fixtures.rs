//! Filesystem fixtures for integration tests

use std::fs;
use std::path::{Path, PathBuf};

use runbooks::ExecEvent;
use tempfile::TempDir;

/// A temporary project directory containing a `subdir` folder.
///
/// Removed when dropped.
pub struct TestProject {
    _dir: TempDir,
    /// Canonical path of the project root
    pub path: PathBuf,
}

impl TestProject {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = fs::canonicalize(dir.path()).expect("Failed to canonicalize temp dir");
        fs::create_dir_all(path.join("subdir")).expect("Failed to create subdir");
        Self { _dir: dir, path }
    }

    pub fn subdir(&self) -> PathBuf {
        self.path.join("subdir")
    }
}

/// Write `files` (relative path, content) under `root`, creating parents.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    fs::create_dir_all(root).expect("Failed to create root");
    for (relative, content) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        fs::write(&path, content).expect("Failed to write file");
    }
}

/// Relative paths of every file under `root`, sorted, with forward slashes.
pub fn list_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}

/// Log lines from a list of events, in order
pub fn log_lines(events: &[ExecEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ExecEvent::Log { line, .. } => Some(line.clone()),
            _ => None,
        })
        .collect()
}

/// The status event's exit code, if any
pub fn exit_code(events: &[ExecEvent]) -> Option<i32> {
    events.iter().find_map(|e| match e {
        ExecEvent::Status { exit_code, .. } => Some(*exit_code),
        _ => None,
    })
}
