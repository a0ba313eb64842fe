//! Applying a [`DiffResult`] to an output directory
//!
//! Every path is validated before anything on disk changes, so a single
//! hostile entry leaves the output directory exactly as it was.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use super::diff::DiffResult;
use super::error::ManifestError;

/// Counts of files touched by [`apply_diff`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplyStats {
    pub written: usize,
    pub deleted: usize,
}

/// Check that `path` is a plain relative path with no `..` segment.
///
/// Both separators are treated as separators and drive-letter prefixes count
/// as absolute, so a manifest produced on another platform cannot slip
/// through.
pub fn validate_relative_path(path: &str) -> Result<(), &'static str> {
    if path.trim().is_empty() {
        return Err("empty path");
    }
    if path.starts_with('/') || path.starts_with('\\') || Path::new(path).is_absolute() {
        return Err("absolute path");
    }
    if has_drive_prefix(path) {
        return Err("absolute path");
    }
    if path.split(['/', '\\']).any(|segment| segment == "..") {
        return Err("parent directory traversal");
    }
    Ok(())
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn validate_diff(diff: &DiffResult) -> Result<(), ManifestError> {
    for (category, paths) in diff.categories() {
        for path in paths {
            validate_relative_path(path).map_err(|reason| ManifestError::UnsafePath {
                category,
                path: path.clone(),
                reason,
            })?;
        }
    }
    Ok(())
}

/// Resolve `relative` under `base` without touching the filesystem, failing
/// if the result would not be strictly inside `base`.
fn contained_path(base: &Path, relative: &str) -> Result<PathBuf, ManifestError> {
    let mut resolved = base.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => return Err(ManifestError::EscapesOutputDir(base.join(relative))),
        }
    }

    if resolved == base || !resolved.starts_with(base) {
        return Err(ManifestError::EscapesOutputDir(resolved));
    }
    Ok(resolved)
}

/// Apply `diff` by copying created and modified files from `source_dir` and
/// deleting orphaned files from `output_dir`.
///
/// Unchanged files are never touched. Orphans that are already gone are not
/// an error. Directories emptied by a deletion are removed up to, but not
/// including, `output_dir`.
pub fn apply_diff(
    diff: &DiffResult,
    source_dir: &Path,
    output_dir: &Path,
) -> Result<ApplyStats, ManifestError> {
    validate_diff(diff)?;

    let mut stats = ApplyStats::default();

    for relative in diff.to_write() {
        let source = contained_path(source_dir, relative)?;
        let dest = contained_path(output_dir, relative)?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| ManifestError::io(parent, e))?;
        }
        // fs::copy carries permission bits across
        fs::copy(&source, &dest).map_err(|e| ManifestError::io(&source, e))?;
        stats.written += 1;
    }

    for relative in &diff.orphaned {
        let dest = contained_path(output_dir, relative)?;

        match fs::remove_file(&dest) {
            Ok(()) => stats.deleted += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %dest.display(), "Orphaned file already removed");
            }
            Err(e) => return Err(ManifestError::io(&dest, e)),
        }

        if let Some(parent) = dest.parent() {
            cleanup_empty_parent_dirs(parent, output_dir);
        }
    }

    tracing::debug!(
        written = stats.written,
        deleted = stats.deleted,
        unchanged = diff.unchanged.len(),
        output_dir = %output_dir.display(),
        "Applied manifest diff"
    );

    Ok(stats)
}

/// Remove `dir` and its ancestors while they are empty, stopping at
/// `output_dir`, which is never removed.
pub fn cleanup_empty_parent_dirs(dir: &Path, output_dir: &Path) {
    let mut current = dir.to_path_buf();

    while current != output_dir && current.starts_with(output_dir) {
        // remove_dir refuses non-empty directories
        if fs::remove_dir(&current).is_err() {
            break;
        }
        if !current.pop() {
            break;
        }
    }
}
