//! Listing helpers: direct-children grouping and glob filtering.
//!
//! Directories are synthetic in the virtual path space: they are inferred
//! from the stored file paths and never exist as records. Both backends
//! enumerate the files under a prefix and delegate the grouping here so
//! listings behave identically.

use crate::models::{ListEntry, VirtualPath};
use crate::storage::pattern::GlobMatcher;
use std::collections::BTreeMap;

/// A stored file as enumerated by a backend.
#[derive(Debug, Clone)]
pub struct FileMeta {
    /// Virtual path of the file.
    pub path: String,
    /// Size in bytes as reported by the backing store.
    pub size: u64,
    /// Last-modified Unix timestamp in seconds, when the store reports one.
    pub modified_at: Option<u64>,
}

/// Returns the directory prefix string for a listing root.
///
/// `/` stays `/`; `/src` becomes `/src/` so stripping it leaves child-relative
/// paths.
pub(crate) fn dir_prefix(prefix: &VirtualPath) -> String {
    if prefix.is_root() {
        "/".to_string()
    } else {
        format!("{}/", prefix.as_str())
    }
}

/// Groups files into direct children of `prefix`, synthesizing directory
/// entries at the next separator.
///
/// Files deeper than one level collapse into a single directory entry with a
/// trailing `/`, zero size, and no timestamp. Entries come back ordered by
/// path.
#[must_use]
pub fn direct_children(prefix: &VirtualPath, files: &[FileMeta]) -> Vec<ListEntry> {
    let prefix_str = dir_prefix(prefix);
    let mut entries: BTreeMap<String, ListEntry> = BTreeMap::new();

    for file in files {
        let Some(rest) = file.path.strip_prefix(&prefix_str) else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }

        if let Some(pos) = rest.find('/') {
            let dir_path = format!("{prefix_str}{}/", &rest[..pos]);
            entries.entry(dir_path.clone()).or_insert(ListEntry {
                path: dir_path,
                is_directory: true,
                size: 0,
                modified_at: None,
            });
        } else {
            entries.insert(
                file.path.clone(),
                ListEntry {
                    path: file.path.clone(),
                    is_directory: false,
                    size: file.size,
                    modified_at: file.modified_at,
                },
            );
        }
    }

    entries.into_values().collect()
}

/// Filters files under `root` by a compiled glob, returning file entries
/// only (no synthesized directories), ordered by path.
///
/// The glob applies to the root-relative path, so `*.py` under `/src`
/// matches `/src/a.py` but not `/src/sub/c.py`.
#[must_use]
pub fn glob_entries(
    root: &VirtualPath,
    matcher: &GlobMatcher,
    files: &[FileMeta],
) -> Vec<ListEntry> {
    let root_str = dir_prefix(root);
    let mut entries: Vec<ListEntry> = files
        .iter()
        .filter_map(|file| {
            let rest = file.path.strip_prefix(&root_str)?;
            if rest.is_empty() || !matcher.is_match(rest) {
                return None;
            }
            Some(ListEntry {
                path: file.path.clone(),
                is_directory: false,
                size: file.size,
                modified_at: file.modified_at,
            })
        })
        .collect();
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    entries
}
