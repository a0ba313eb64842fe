use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::hash::ManifestEntry;

/// Classification of every path seen in two successive renders
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// In the old manifest only; to be deleted
    pub orphaned: Vec<String>,
    /// In the new manifest only
    pub created: Vec<String>,
    /// In both with different content
    pub modified: Vec<String>,
    pub unchanged: Vec<String>,
}

impl DiffResult {
    /// True when applying would write or delete nothing.
    pub fn is_noop(&self) -> bool {
        self.orphaned.is_empty() && self.created.is_empty() && self.modified.is_empty()
    }

    /// Paths that must be copied from the rendered directory
    pub fn to_write(&self) -> impl Iterator<Item = &String> {
        self.created.iter().chain(self.modified.iter())
    }

    pub(crate) fn categories(&self) -> [(&'static str, &[String]); 4] {
        [
            ("orphaned", self.orphaned.as_slice()),
            ("created", self.created.as_slice()),
            ("modified", self.modified.as_slice()),
            ("unchanged", self.unchanged.as_slice()),
        ]
    }
}

/// Compare two manifests. Each of the four lists comes back sorted.
pub fn compute_diff(old: &[ManifestEntry], new: &[ManifestEntry]) -> DiffResult {
    let old: BTreeMap<&str, &str> = old
        .iter()
        .map(|e| (e.path.as_str(), e.content_hash.as_str()))
        .collect();
    let new: BTreeMap<&str, &str> = new
        .iter()
        .map(|e| (e.path.as_str(), e.content_hash.as_str()))
        .collect();

    let paths: BTreeSet<&str> = old.keys().chain(new.keys()).copied().collect();
    let mut diff = DiffResult::default();

    for path in paths {
        let bucket = match (old.get(path), new.get(path)) {
            (Some(_), None) => &mut diff.orphaned,
            (None, Some(_)) => &mut diff.created,
            (Some(before), Some(after)) if before != after => &mut diff.modified,
            (Some(_), Some(_)) => &mut diff.unchanged,
            (None, None) => continue,
        };
        bucket.push(path.to_string());
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(path: &str, hash: &str) -> ManifestEntry {
        ManifestEntry::new(path, hash)
    }

    #[test]
    fn test_classifies_each_category() {
        let old = vec![
            entry("keep.txt", "h1"),
            entry("change.txt", "h2"),
            entry("gone.txt", "h3"),
        ];
        let new = vec![
            entry("keep.txt", "h1"),
            entry("change.txt", "h2-new"),
            entry("fresh.txt", "h4"),
        ];

        let diff = compute_diff(&old, &new);
        assert_eq!(diff.unchanged, vec!["keep.txt"]);
        assert_eq!(diff.modified, vec!["change.txt"]);
        assert_eq!(diff.orphaned, vec!["gone.txt"]);
        assert_eq!(diff.created, vec!["fresh.txt"]);
        assert!(!diff.is_noop());
    }

    #[test]
    fn test_empty_manifests() {
        let diff = compute_diff(&[], &[]);
        assert_eq!(diff, DiffResult::default());
        assert!(diff.is_noop());
    }

    #[test]
    fn test_to_write_lists_created_then_modified() {
        let diff = DiffResult {
            created: vec!["b".into()],
            modified: vec!["a".into()],
            ..Default::default()
        };
        let paths: Vec<&String> = diff.to_write().collect();
        assert_eq!(paths, vec!["b", "a"]);
    }

    fn manifest_strategy() -> impl Strategy<Value = Vec<ManifestEntry>> {
        prop::collection::btree_map("[a-z]{1,6}(/[a-z]{1,6})?", "[0-9a-f]{4}", 0..12).prop_map(
            |files| {
                files
                    .into_iter()
                    .map(|(path, hash)| ManifestEntry::new(path, hash))
                    .collect()
            },
        )
    }

    fn sorted_paths(entries: &[ManifestEntry]) -> Vec<String> {
        let mut paths: Vec<String> = entries.iter().map(|e| e.path.clone()).collect();
        paths.sort();
        paths
    }

    proptest! {
        #[test]
        fn prop_same_manifest_is_unchanged(a in manifest_strategy()) {
            let diff = compute_diff(&a, &a);
            prop_assert_eq!(diff.unchanged, sorted_paths(&a));
            prop_assert!(diff.orphaned.is_empty());
            prop_assert!(diff.created.is_empty());
            prop_assert!(diff.modified.is_empty());
        }

        #[test]
        fn prop_from_empty_is_all_created(b in manifest_strategy()) {
            let diff = compute_diff(&[], &b);
            prop_assert_eq!(diff.created, sorted_paths(&b));
            prop_assert!(diff.unchanged.is_empty());
        }

        #[test]
        fn prop_to_empty_is_all_orphaned(a in manifest_strategy()) {
            let diff = compute_diff(&a, &[]);
            prop_assert_eq!(diff.orphaned, sorted_paths(&a));
            prop_assert!(diff.created.is_empty());
        }

        #[test]
        fn prop_every_path_in_exactly_one_bucket(
            a in manifest_strategy(),
            b in manifest_strategy(),
        ) {
            let diff = compute_diff(&a, &b);
            let mut classified: Vec<String> = diff
                .orphaned
                .iter()
                .chain(&diff.created)
                .chain(&diff.modified)
                .chain(&diff.unchanged)
                .cloned()
                .collect();
            classified.sort();

            let mut union: Vec<String> = sorted_paths(&a);
            union.extend(sorted_paths(&b));
            union.sort();
            union.dedup();

            prop_assert_eq!(classified, union);
        }
    }
}
