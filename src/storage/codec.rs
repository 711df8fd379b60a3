//! Content codec: line-oriented payloads and text transformations.
//!
//! Files are presented to callers as line-oriented text but persisted as
//! structured records: a JSON payload holding an ordered line array (or a
//! base64 body for binary content) plus timestamps. Both backends share this
//! codec so reads, edits, and searches behave identically regardless of the
//! backing store.
//!
//! Contract: `decode(encode(x)) == x` for any UTF-8 text, including embedded
//! newlines and empty content. Binary content bypasses line-splitting and
//! round-trips as opaque bytes.

use crate::models::OpError;
use crate::{Error, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

/// Persisted content body: an ordered line array for text, base64 for bytes
/// that are not valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileBody {
    /// Line-oriented text content.
    Text {
        /// The lines, in order, without trailing newlines.
        content: Vec<String>,
    },
    /// Opaque binary content.
    Binary {
        /// Base64-encoded bytes.
        binary: String,
    },
}

/// Full persisted payload: body plus record metadata.
///
/// The object-store backend serializes the whole payload as the blob body.
/// The relational backend stores the body in a JSONB column and the
/// metadata in dedicated columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePayload {
    /// Content body.
    #[serde(flatten)]
    pub body: FileBody,
    /// Creation Unix timestamp in seconds.
    #[serde(default)]
    pub created_at: u64,
    /// Last-modified Unix timestamp in seconds.
    #[serde(default)]
    pub modified_at: u64,
}

/// Encodes UTF-8 text into a line-array body.
#[must_use]
pub fn encode_text(text: &str) -> FileBody {
    FileBody::Text {
        content: text.split('\n').map(str::to_string).collect(),
    }
}

/// Encodes raw bytes: valid UTF-8 becomes line-oriented text, anything else
/// a base64 binary body.
#[must_use]
pub fn encode_bytes(bytes: &[u8]) -> FileBody {
    match std::str::from_utf8(bytes) {
        Ok(text) => encode_text(text),
        Err(_) => FileBody::Binary {
            binary: BASE64.encode(bytes),
        },
    }
}

/// Decodes a body back into text.
///
/// Binary bodies only arise from non-UTF-8 uploads; rendering them as text
/// is lossy by construction, and `decode_bytes` is the faithful channel.
#[must_use]
pub fn decode_text(body: &FileBody) -> String {
    match body {
        FileBody::Text { content } => content.join("\n"),
        FileBody::Binary { binary } => {
            String::from_utf8_lossy(&BASE64.decode(binary).unwrap_or_default()).into_owned()
        }
    }
}

/// Decodes a body into raw bytes.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] when a binary body holds corrupt
/// base64.
pub fn decode_bytes(body: &FileBody) -> Result<Vec<u8>> {
    match body {
        FileBody::Text { content } => Ok(content.join("\n").into_bytes()),
        FileBody::Binary { binary } => BASE64.decode(binary).map_err(|e| Error::OperationFailed {
            operation: "decode_binary_body".to_string(),
            cause: e.to_string(),
        }),
    }
}

/// Returns the lines of a body for scanning and rendering.
#[must_use]
pub fn body_lines(body: &FileBody) -> Vec<String> {
    match body {
        FileBody::Text { content } => content.clone(),
        // Lossy fallback: split the decoded bytes so line numbering stays
        // consistent with what a read would render.
        FileBody::Binary { .. } => decode_text(body).split('\n').map(str::to_string).collect(),
    }
}

/// Renders a line window with 1-based, right-aligned line numbers.
///
/// `offset` is the 1-based first line to include (`None` and `0` behave as
/// 1); `limit` caps the number of lines. An offset past the end of the file
/// yields empty content. Line numbers are absolute, so a windowed read is
/// stable against the same content snapshot.
#[must_use]
pub fn render_numbered(lines: &[String], offset: Option<usize>, limit: Option<usize>) -> String {
    let start = offset.unwrap_or(1).max(1) - 1;
    if start >= lines.len() {
        return String::new();
    }
    let end = limit.map_or(lines.len(), |l| lines.len().min(start.saturating_add(l)));

    lines[start..end]
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:>6}\t{line}", start + i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Applies a substring replacement to text content.
///
/// Returns the new text and the number of occurrences replaced.
///
/// # Errors
///
/// Returns [`OpError::NoMatch`] when `old` does not occur (or is empty) and
/// [`OpError::AmbiguousMatch`] when it occurs more than once without
/// `replace_all`.
pub fn edit_text(
    path: &str,
    text: &str,
    old: &str,
    new: &str,
    replace_all: bool,
) -> std::result::Result<(String, usize), OpError> {
    if old.is_empty() {
        return Err(OpError::NoMatch {
            path: path.to_string(),
            needle: old.to_string(),
        });
    }

    let occurrences = text.matches(old).count();
    match occurrences {
        0 => Err(OpError::NoMatch {
            path: path.to_string(),
            needle: old.to_string(),
        }),
        1 => Ok((text.replacen(old, new, 1), 1)),
        n if replace_all => Ok((text.replace(old, new), n)),
        n => Err(OpError::AmbiguousMatch {
            path: path.to_string(),
            needle: old.to_string(),
            occurrences: n,
        }),
    }
}
