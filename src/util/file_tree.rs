//! Directory listings reported alongside captured files

use std::io;
use std::path::Path;

use serde::Serialize;
use walkdir::WalkDir;

use super::paths::to_slash_path;

/// Node kind in a [`FileTreeNode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
}

/// A file or folder in a rendered output directory
#[derive(Debug, Clone, Serialize)]
pub struct FileTreeNode {
    /// Path relative to the listing root, forward slashes
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FileTreeNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Build a listing of `root`.
///
/// Folders sort before files, each group alphabetically. Hidden entries
/// (leading `.`) are skipped. A missing root yields an empty listing.
pub fn build_file_tree(root: &Path) -> io::Result<Vec<FileTreeNode>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by(|a, b| {
            let (a_dir, b_dir) = (a.file_type().is_dir(), b.file_type().is_dir());
            b_dir.cmp(&a_dir).then_with(|| a.file_name().cmp(b.file_name()))
        })
        .into_iter()
        .filter_entry(|e| !e.file_name().to_string_lossy().starts_with('.'));

    // Open folders along the current path; index i holds depth i + 1
    let mut open: Vec<FileTreeNode> = Vec::new();
    let mut roots = Vec::new();

    for entry in walker {
        let entry = entry?;
        while open.len() >= entry.depth() {
            close_folder(&mut open, &mut roots);
        }

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let id = to_slash_path(relative);
        let name = entry.file_name().to_string_lossy().into_owned();

        if entry.file_type().is_dir() {
            open.push(FileTreeNode {
                id,
                name,
                kind: NodeKind::Folder,
                children: Vec::new(),
                size: None,
            });
        } else {
            let node = FileTreeNode {
                id,
                name,
                kind: NodeKind::File,
                children: Vec::new(),
                size: Some(entry.metadata()?.len()),
            };
            match open.last_mut() {
                Some(parent) => parent.children.push(node),
                None => roots.push(node),
            }
        }
    }

    while !open.is_empty() {
        close_folder(&mut open, &mut roots);
    }
    Ok(roots)
}

fn close_folder(open: &mut Vec<FileTreeNode>, roots: &mut Vec<FileTreeNode>) {
    if let Some(folder) = open.pop() {
        match open.last_mut() {
            Some(parent) => parent.children.push(folder),
            None => roots.push(folder),
        }
    }
}
