//! Virtual path type and normalization.
//!
//! A [`VirtualPath`] is the caller-visible identity of a file, independent of
//! the backing store's native addressing. Both backends translate it into
//! their own physical key (S3 object key, relational primary key).
//!
//! # Security
//!
//! Normalization rejects `..` segments and NUL bytes outright, so a virtual
//! path can never escape the configured storage prefix.

use crate::models::OpError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized absolute virtual path.
///
/// Invariants: starts with `/`, no empty segments, no `.` or `..` segments,
/// case-sensitive. A path denotes at most one stored file record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VirtualPath(String);

impl VirtualPath {
    /// Parses and normalizes a raw path into a file path.
    ///
    /// Relative input is rooted (`src/main.py` becomes `/src/main.py`),
    /// duplicate separators collapse, and `.` segments are dropped. The
    /// result always names a file, never the root.
    ///
    /// # Errors
    ///
    /// Returns [`OpError::InvalidPath`] when the input is empty, contains a
    /// `..` segment or a NUL byte, or normalizes to the bare root.
    pub fn parse(raw: &str) -> Result<Self, OpError> {
        let segments = Self::segments_of(raw)?;
        if segments.is_empty() {
            return Err(OpError::InvalidPath {
                reason: format!("'{raw}' does not name a file"),
            });
        }
        Ok(Self(format!("/{}", segments.join("/"))))
    }

    /// Parses and normalizes a raw path into a listing prefix.
    ///
    /// Same rules as [`Self::parse`], except the bare root `/` is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`OpError::InvalidPath`] when the input is empty, contains a
    /// `..` segment or a NUL byte.
    pub fn parse_prefix(raw: &str) -> Result<Self, OpError> {
        let segments = Self::segments_of(raw)?;
        if segments.is_empty() {
            return Ok(Self("/".to_string()));
        }
        Ok(Self(format!("/{}", segments.join("/"))))
    }

    /// Splits raw input into validated segments.
    fn segments_of(raw: &str) -> Result<Vec<&str>, OpError> {
        if raw.is_empty() {
            return Err(OpError::InvalidPath {
                reason: "path is empty".to_string(),
            });
        }
        if raw.contains('\0') {
            return Err(OpError::InvalidPath {
                reason: "path contains a NUL byte".to_string(),
            });
        }

        let mut segments = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    return Err(OpError::InvalidPath {
                        reason: format!("'{raw}' contains a parent-directory segment"),
                    });
                }
                s => segments.push(s),
            }
        }
        Ok(segments)
    }

    /// Returns the path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the final path segment (the file name).
    ///
    /// The root prefix has no file name and yields an empty string.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// Composes the physical object key for this path under a storage prefix.
    ///
    /// Keys never carry a leading slash: path `/src/a.py` under prefix
    /// `workspace` becomes `workspace/src/a.py`; under an empty prefix it
    /// becomes `src/a.py`.
    #[must_use]
    pub fn storage_key(&self, prefix: &str) -> String {
        let relative = self.0.trim_start_matches('/');
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            relative.to_string()
        } else {
            format!("{prefix}/{relative}")
        }
    }

    /// Whether this path is the bare root prefix.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<VirtualPath> for String {
    fn from(path: VirtualPath) -> Self {
        path.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roots_relative_input() {
        let path = VirtualPath::parse("src/main.py").unwrap();
        assert_eq!(path.as_str(), "/src/main.py");
    }

    #[test]
    fn test_parse_collapses_separators_and_dots() {
        let path = VirtualPath::parse("//src/.//main.py").unwrap();
        assert_eq!(path.as_str(), "/src/main.py");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(matches!(
            VirtualPath::parse(""),
            Err(OpError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_parent_segments() {
        assert!(matches!(
            VirtualPath::parse("/src/../etc/passwd"),
            Err(OpError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_nul() {
        assert!(matches!(
            VirtualPath::parse("/src/a\0.py"),
            Err(OpError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_bare_root() {
        assert!(matches!(
            VirtualPath::parse("/"),
            Err(OpError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_parse_prefix_allows_root() {
        let prefix = VirtualPath::parse_prefix("/").unwrap();
        assert!(prefix.is_root());
        assert_eq!(prefix.as_str(), "/");
    }

    #[test]
    fn test_storage_key_with_prefix() {
        let path = VirtualPath::parse("/src/a.py").unwrap();
        assert_eq!(path.storage_key("workspace"), "workspace/src/a.py");
        assert_eq!(path.storage_key("workspace/"), "workspace/src/a.py");
        assert_eq!(path.storage_key(""), "src/a.py");
    }

    #[test]
    fn test_file_name() {
        let path = VirtualPath::parse("/src/sub/c.py").unwrap();
        assert_eq!(path.file_name(), "c.py");
    }

    #[test]
    fn test_case_sensitivity_preserved() {
        let lower = VirtualPath::parse("/src/File.py").unwrap();
        let upper = VirtualPath::parse("/src/file.py").unwrap();
        assert_ne!(lower, upper);
    }
}
