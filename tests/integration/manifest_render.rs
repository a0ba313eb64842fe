//! Integration tests for template reconciliation
//!
//! Renders a template several times into the same output directory and
//! checks that only generated files change.

use super::common::fixtures::{list_files, write_tree};
use runbooks::manifest::{apply_diff, build_manifest_from_directory, compute_diff};
use runbooks::{render_with_manifest, DiffResult, ManifestError, ManifestStore};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Returns a render closure that writes `files` into `root/name`.
fn renderer<'a>(
    root: &'a Path,
    name: &'a str,
    files: &'a [(&'a str, &'a str)],
) -> impl FnOnce() -> anyhow::Result<PathBuf> + 'a {
    move || {
        let dir = root.join(name);
        write_tree(&dir, files);
        Ok(dir)
    }
}

#[test]
fn test_second_render_reconciles_output() {
    let work = TempDir::new().unwrap();
    let output = work.path().join("output");
    let store = ManifestStore::new();

    let first = render_with_manifest(
        &store,
        "app",
        renderer(work.path(), "r1", &[("a.txt", "original"), ("b.py", "print(1)")]),
        &output,
    )
    .unwrap();
    assert_eq!(first.created, vec!["a.txt", "b.py"]);
    assert_eq!(list_files(&output), vec!["a.txt", "b.py"]);

    let second = render_with_manifest(
        &store,
        "app",
        renderer(work.path(), "r2", &[("a.txt", "changed"), ("c.js", "x()")]),
        &output,
    )
    .unwrap();

    assert_eq!(
        second,
        DiffResult {
            orphaned: vec!["b.py".into()],
            created: vec!["c.js".into()],
            modified: vec!["a.txt".into()],
            unchanged: vec![],
        }
    );
    assert_eq!(list_files(&output), vec!["a.txt", "c.js"]);
    assert_eq!(fs::read_to_string(output.join("a.txt")).unwrap(), "changed");
}

#[test]
fn test_user_files_outside_manifest_survive() {
    let work = TempDir::new().unwrap();
    let output = work.path().join("output");
    let store = ManifestStore::new();

    render_with_manifest(
        &store,
        "infra",
        renderer(work.path(), "r1", &[("main.tf", "v1"), ("modules/vpc/main.tf", "vpc")]),
        &output,
    )
    .unwrap();
    write_tree(&output, &[("notes.md", "mine")]);

    let diff = render_with_manifest(
        &store,
        "infra",
        renderer(work.path(), "r2", &[("main.tf", "v2")]),
        &output,
    )
    .unwrap();

    assert_eq!(diff.orphaned, vec!["modules/vpc/main.tf"]);
    assert_eq!(list_files(&output), vec!["main.tf", "notes.md"]);
    assert!(!output.join("modules").exists());
}

#[test]
fn test_apply_is_idempotent() {
    let work = TempDir::new().unwrap();
    let source = work.path().join("source");
    let output = work.path().join("output");
    write_tree(&source, &[("a.txt", "alpha"), ("nested/b.txt", "beta")]);
    write_tree(&output, &[("stale.txt", "old")]);

    let old = build_manifest_from_directory(&output).unwrap();
    let new = build_manifest_from_directory(&source).unwrap();
    let diff = compute_diff(&old, &new);

    apply_diff(&diff, &source, &output).unwrap();
    let after_first = list_files(&output);
    apply_diff(&diff, &source, &output).unwrap();

    assert_eq!(list_files(&output), after_first);
    assert_eq!(after_first, vec!["a.txt", "nested/b.txt"]);

    let settled = compute_diff(&build_manifest_from_directory(&output).unwrap(), &new);
    assert!(settled.is_noop());
    assert_eq!(settled.unchanged, vec!["a.txt", "nested/b.txt"]);
}

#[test]
fn test_traversal_in_diff_touches_nothing() {
    let work = TempDir::new().unwrap();
    let source = work.path().join("source");
    let output = work.path().join("output");
    write_tree(&source, &[("ok.txt", "new")]);
    write_tree(&output, &[("ok.txt", "old"), ("doomed.txt", "still here")]);
    write_tree(work.path(), &[("victim.txt", "do not touch")]);

    let diff = DiffResult {
        orphaned: vec!["doomed.txt".into(), "../victim.txt".into()],
        modified: vec!["ok.txt".into()],
        ..Default::default()
    };

    let err = apply_diff(&diff, &source, &output).unwrap_err();
    assert!(matches!(err, ManifestError::UnsafePath { .. }));

    assert_eq!(fs::read_to_string(output.join("ok.txt")).unwrap(), "old");
    assert_eq!(fs::read_to_string(output.join("doomed.txt")).unwrap(), "still here");
    assert_eq!(
        fs::read_to_string(work.path().join("victim.txt")).unwrap(),
        "do not touch"
    );
}
