use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use super::apply::apply_diff;
use super::diff::{compute_diff, DiffResult};
use super::error::ManifestError;
use super::hash::{build_manifest_from_directory, TemplateManifest};
use crate::util::paths::to_slash_path;

/// Last manifest rendered per template, for the lifetime of the process
#[derive(Debug, Default)]
pub struct ManifestStore {
    manifests: RwLock<HashMap<String, TemplateManifest>>,
}

impl ManifestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, template_id: &str) -> Option<TemplateManifest> {
        self.manifests.read().get(template_id).cloned()
    }

    pub fn set(&self, manifest: TemplateManifest) {
        self.manifests
            .write()
            .insert(manifest.template_id.clone(), manifest);
    }

    pub fn delete(&self, template_id: &str) -> Option<TemplateManifest> {
        self.manifests.write().remove(template_id)
    }

    pub fn clear(&self) {
        self.manifests.write().clear();
    }

    pub fn len(&self) -> usize {
        self.manifests.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.read().is_empty()
    }
}

/// Render a template and reconcile the result into `output_dir`.
///
/// `render` produces a fresh directory. Its files are diffed against the
/// manifest stored for `template_id`, the diff is applied, and the new
/// manifest replaces the stored one. The rendered directory is removed
/// afterwards unless it is, or contains, `output_dir`. A failed apply
/// leaves the stored manifest as it was.
pub fn render_with_manifest<F>(
    store: &ManifestStore,
    template_id: &str,
    render: F,
    output_dir: &Path,
) -> Result<DiffResult, ManifestError>
where
    F: FnOnce() -> anyhow::Result<PathBuf>,
{
    let rendered = render().map_err(ManifestError::Render)?;
    let result = reconcile(store, template_id, &rendered, output_dir);
    remove_rendered_dir(&rendered, output_dir);
    result
}

fn reconcile(
    store: &ManifestStore,
    template_id: &str,
    rendered: &Path,
    output_dir: &Path,
) -> Result<DiffResult, ManifestError> {
    let files = build_manifest_from_directory(rendered)?;
    let previous = store.get(template_id).map(|m| m.files).unwrap_or_default();

    let diff = compute_diff(&previous, &files);
    fs::create_dir_all(output_dir).map_err(|e| ManifestError::io(output_dir, e))?;
    let stats = apply_diff(&diff, rendered, output_dir)?;

    tracing::info!(
        template_id,
        created = diff.created.len(),
        modified = diff.modified.len(),
        orphaned = diff.orphaned.len(),
        unchanged = diff.unchanged.len(),
        written = stats.written,
        deleted = stats.deleted,
        "Reconciled rendered template"
    );

    store.set(TemplateManifest {
        template_id: template_id.to_string(),
        output_dir: to_slash_path(output_dir),
        files,
    });

    Ok(diff)
}

fn remove_rendered_dir(rendered: &Path, output_dir: &Path) {
    if rendered == output_dir || output_dir.starts_with(rendered) {
        tracing::warn!(
            rendered = %rendered.display(),
            "Rendered directory overlaps output directory, not removing"
        );
        return;
    }
    if let Err(e) = fs::remove_dir_all(rendered) {
        tracing::warn!(path = %rendered.display(), error = %e, "Failed to remove rendered directory");
    }
}
