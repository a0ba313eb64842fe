//! Copying files a script left in `$RUNBOOK_FILES` to the output location

use std::fs;
use std::io;
use std::path::Path;

use walkdir::WalkDir;

use super::events::CapturedFile;
use crate::util::paths::to_slash_path;

/// Copy everything under `src_dir` into `output_dir`, keeping relative
/// layout and permission bits. Returns the files copied, in walk order.
///
/// An empty `src_dir` copies nothing and leaves `output_dir` untouched.
pub fn capture_files_from_dir(src_dir: &Path, output_dir: &Path) -> io::Result<Vec<CapturedFile>> {
    if fs::read_dir(src_dir)?.next().is_none() {
        return Ok(Vec::new());
    }

    fs::create_dir_all(output_dir)?;

    let mut captured = Vec::new();
    for entry in WalkDir::new(src_dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(src_dir)
            .map_err(io::Error::other)?;
        let dest = output_dir.join(relative);
        let metadata = entry.metadata().map_err(io::Error::other)?;

        if metadata.is_dir() {
            fs::create_dir_all(&dest)?;
            fs::set_permissions(&dest, metadata.permissions())?;
            continue;
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(entry.path(), &dest).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("failed to copy {}: {}", relative.display(), e),
            )
        })?;

        captured.push(CapturedFile {
            path: to_slash_path(relative),
            size: metadata.len(),
        });
    }

    Ok(captured)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_dir_captures_nothing() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let output_dir = out.path().join("generated");

        let captured = capture_files_from_dir(src.path(), &output_dir).unwrap();
        assert!(captured.is_empty());
        assert!(!output_dir.exists());
    }

    #[test]
    fn test_copies_nested_files() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::write(src.path().join("top.txt"), "top").unwrap();
        fs::create_dir_all(src.path().join("nested/deep")).unwrap();
        fs::write(src.path().join("nested/deep/file.tf"), "resource {}").unwrap();

        let captured = capture_files_from_dir(src.path(), out.path()).unwrap();

        let paths: Vec<&str> = captured.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["nested/deep/file.tf", "top.txt"]);
        assert_eq!(captured[0].size, 11);
        assert_eq!(
            fs::read_to_string(out.path().join("nested/deep/file.tf")).unwrap(),
            "resource {}"
        );
    }

    #[test]
    fn test_overwrites_existing_output() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::write(out.path().join("a.txt"), "old").unwrap();
        fs::write(src.path().join("a.txt"), "new").unwrap();

        capture_files_from_dir(src.path(), out.path()).unwrap();
        assert_eq!(fs::read_to_string(out.path().join("a.txt")).unwrap(), "new");
    }

    #[cfg(unix)]
    #[test]
    fn test_preserves_mode() {
        use std::os::unix::fs::PermissionsExt;

        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let script = src.path().join("run.sh");
        fs::write(&script, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        capture_files_from_dir(src.path(), out.path()).unwrap();
        let mode = fs::metadata(out.path().join("run.sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_missing_source_is_error() {
        let out = TempDir::new().unwrap();
        assert!(capture_files_from_dir(&out.path().join("missing"), out.path()).is_err());
    }
}
