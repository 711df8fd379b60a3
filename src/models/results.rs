//! Structured operation results.
//!
//! Every expected per-operation condition is a value inside these results,
//! not a raised error: callers branch on the `error` field instead of string
//! matching or exception handling. Only infrastructure faults propagate as
//! [`crate::Error`].

use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

/// Expected per-operation failure, reported inside operation results.
///
/// The `Infrastructure` variant appears only in batch item results, where
/// per-item isolation forbids raising; single operations raise
/// [`crate::Error`] for infrastructure faults instead.
#[derive(Debug, Clone, PartialEq, Eq, ThisError, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OpError {
    /// No file record exists at the path.
    #[error("file '{path}' not found")]
    NotFound {
        /// The path that was requested.
        path: String,
    },

    /// A file record already exists at the path; overwrite goes through edit.
    #[error("file '{path}' already exists")]
    AlreadyExists {
        /// The path that was requested.
        path: String,
    },

    /// The edit target occurs more than once and `replace_all` was not set.
    #[error(
        "'{needle}' occurs {occurrences} times in '{path}'; pass replace_all to replace every occurrence"
    )]
    AmbiguousMatch {
        /// The path that was edited.
        path: String,
        /// The substring that was searched for.
        needle: String,
        /// How many times the substring occurs.
        occurrences: usize,
    },

    /// The edit target does not occur in the file.
    #[error("'{needle}' not found in '{path}'")]
    NoMatch {
        /// The path that was edited.
        path: String,
        /// The substring that was searched for.
        needle: String,
    },

    /// The backend has not been initialized, or was already closed.
    #[error("backend not initialized; call initialize() first")]
    NotInitialized,

    /// The supplied path failed normalization.
    #[error("invalid path: {reason}")]
    InvalidPath {
        /// Why the path was rejected.
        reason: String,
    },

    /// An infrastructure fault isolated inside a batch item.
    #[error("infrastructure failure: {message}")]
    Infrastructure {
        /// The underlying failure message.
        message: String,
    },
}

/// Result of a line-windowed read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadResult {
    /// The path that was read.
    pub path: String,
    /// Rendered content: each line prefixed with its 1-based number.
    pub content: String,
    /// Expected failure, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OpError>,
}

impl ReadResult {
    /// Builds a successful read result.
    #[must_use]
    pub const fn ok(path: String, content: String) -> Self {
        Self {
            path,
            content,
            error: None,
        }
    }

    /// Builds a failed read result.
    #[must_use]
    pub const fn err(path: String, error: OpError) -> Self {
        Self {
            path,
            content: String::new(),
            error: Some(error),
        }
    }
}

/// Result of a create-if-absent write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    /// The path that was written.
    pub path: String,
    /// Bytes of content persisted; zero when the write failed.
    pub bytes_written: u64,
    /// Expected failure, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OpError>,
}

impl WriteResult {
    /// Builds a successful write result.
    #[must_use]
    pub const fn ok(path: String, bytes_written: u64) -> Self {
        Self {
            path,
            bytes_written,
            error: None,
        }
    }

    /// Builds a failed write result.
    #[must_use]
    pub const fn err(path: String, error: OpError) -> Self {
        Self {
            path,
            bytes_written: 0,
            error: Some(error),
        }
    }
}

/// Result of an in-place substring edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditResult {
    /// The path that was edited.
    pub path: String,
    /// Number of occurrences replaced; zero when the edit failed.
    pub occurrences: usize,
    /// Expected failure, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OpError>,
}

impl EditResult {
    /// Builds a successful edit result.
    #[must_use]
    pub const fn ok(path: String, occurrences: usize) -> Self {
        Self {
            path,
            occurrences,
            error: None,
        }
    }

    /// Builds a failed edit result.
    #[must_use]
    pub const fn err(path: String, error: OpError) -> Self {
        Self {
            path,
            occurrences: 0,
            error: Some(error),
        }
    }
}

/// One entry in a listing: a stored file or a synthesized directory.
///
/// Directory entries are inferred from path prefixes, never stored; their
/// paths carry a trailing `/`, their size is zero, and they have no
/// timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    /// Virtual path; synthesized directories end with `/`.
    pub path: String,
    /// Whether this entry is a synthesized directory.
    pub is_directory: bool,
    /// Size in bytes as reported by the backing store; zero for directories.
    pub size: u64,
    /// Last-modified Unix timestamp in seconds; `None` for directories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<u64>,
}

/// Result of a listing or glob operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResult {
    /// Matching entries, ordered by path.
    pub entries: Vec<ListEntry>,
    /// Expected failure, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OpError>,
}

impl ListResult {
    /// Builds a successful list result.
    #[must_use]
    pub const fn ok(entries: Vec<ListEntry>) -> Self {
        Self {
            entries,
            error: None,
        }
    }

    /// Builds a failed list result.
    #[must_use]
    pub const fn err(error: OpError) -> Self {
        Self {
            entries: Vec::new(),
            error: Some(error),
        }
    }
}

/// One matching line from a grep scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrepMatch {
    /// Virtual path of the file containing the match.
    pub path: String,
    /// 1-based line number.
    pub line: usize,
    /// The full matching line.
    pub text: String,
}

/// Result of a grep operation.
///
/// An empty match set is a successful result, never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrepResult {
    /// All matching lines, grouped by file in path order.
    pub matches: Vec<GrepMatch>,
    /// Expected failure, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OpError>,
}

impl GrepResult {
    /// Builds a successful grep result.
    #[must_use]
    pub const fn ok(matches: Vec<GrepMatch>) -> Self {
        Self {
            matches,
            error: None,
        }
    }

    /// Builds a failed grep result.
    #[must_use]
    pub const fn err(error: OpError) -> Self {
        Self {
            matches: Vec::new(),
            error: Some(error),
        }
    }
}

/// One item of a batch upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadItem {
    /// Destination virtual path.
    pub path: String,
    /// Raw bytes to persist. Valid UTF-8 is stored as line-oriented text;
    /// anything else round-trips as an opaque binary payload.
    pub bytes: Vec<u8>,
}

impl UploadItem {
    /// Builds an upload item.
    #[must_use]
    pub fn new(path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            bytes: bytes.into(),
        }
    }
}

/// Per-item result of a batch download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResult {
    /// The path that was requested.
    pub path: String,
    /// Raw content bytes; `None` when the item failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<Vec<u8>>,
    /// Expected failure, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OpError>,
}

impl DownloadResult {
    /// Builds a successful download result.
    #[must_use]
    pub const fn ok(path: String, bytes: Vec<u8>) -> Self {
        Self {
            path,
            bytes: Some(bytes),
            error: None,
        }
    }

    /// Builds a failed download result.
    #[must_use]
    pub const fn err(path: String, error: OpError) -> Self {
        Self {
            path,
            bytes: None,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_error_display() {
        let err = OpError::NotFound {
            path: "/src/a.py".to_string(),
        };
        assert_eq!(err.to_string(), "file '/src/a.py' not found");

        let err = OpError::AmbiguousMatch {
            path: "/src/a.py".to_string(),
            needle: "x".to_string(),
            occurrences: 3,
        };
        assert!(err.to_string().contains("occurs 3 times"));
    }

    #[test]
    fn test_op_error_serializes_tagged() {
        let err = OpError::AlreadyExists {
            path: "/a.txt".to_string(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "already_exists");
        assert_eq!(json["path"], "/a.txt");
    }

    #[test]
    fn test_write_result_constructors() {
        let ok = WriteResult::ok("/a.txt".to_string(), 12);
        assert!(ok.error.is_none());
        assert_eq!(ok.bytes_written, 12);

        let err = WriteResult::err(
            "/a.txt".to_string(),
            OpError::AlreadyExists {
                path: "/a.txt".to_string(),
            },
        );
        assert_eq!(err.bytes_written, 0);
        assert!(err.error.is_some());
    }

    #[test]
    fn test_error_field_skipped_when_absent() {
        let ok = ReadResult::ok("/a.txt".to_string(), "     1\thi".to_string());
        let json = serde_json::to_string(&ok).unwrap();
        assert!(!json.contains("error"));
    }
}
