//! Content-hash manifests for generated file trees
//!
//! Each render of a template is hashed file by file and compared with the
//! previous render. Only files whose generated content changed are
//! rewritten, and files the template no longer produces are deleted, so
//! user edits to untouched files survive a re-render.

pub mod apply;
mod diff;
mod error;
mod hash;
mod store;

pub use apply::{apply_diff, cleanup_empty_parent_dirs, validate_relative_path, ApplyStats};
pub use diff::{compute_diff, DiffResult};
pub use error::ManifestError;
pub use hash::{build_manifest_from_directory, hash_file_content, ManifestEntry, TemplateManifest};
pub use store::{render_with_manifest, ManifestStore};
