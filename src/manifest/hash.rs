use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use super::error::ManifestError;
use crate::util::paths::to_slash_path;

/// One generated file and the hash of its content
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Relative to the output directory, forward slashes
    pub path: String,
    pub content_hash: String,
}

impl ManifestEntry {
    pub fn new(path: impl Into<String>, content_hash: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content_hash: content_hash.into(),
        }
    }
}

/// Files last rendered for a template into an output directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateManifest {
    pub template_id: String,
    pub output_dir: String,
    pub files: Vec<ManifestEntry>,
}

/// SHA-256 of `content` as 64 lowercase hex characters.
pub fn hash_file_content(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

/// Hash every regular file under `dir`. Entries are sorted by path.
pub fn build_manifest_from_directory(dir: &Path) -> Result<Vec<ManifestEntry>, ManifestError> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let content = fs::read(entry.path()).map_err(|e| ManifestError::io(entry.path(), e))?;
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|_| ManifestError::EscapesOutputDir(entry.path().to_path_buf()))?;

        entries.push(ManifestEntry {
            path: to_slash_path(relative),
            content_hash: hash_file_content(&content),
        });
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}
