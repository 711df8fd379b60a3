//! # Agentfs
//!
//! Remote file storage backends for AI agent runtimes.
//!
//! Agentfs gives an agent runtime a POSIX-like virtual path space over
//! heterogeneous persistent stores. Two backends implement one uniform
//! contract: an object-store backend (S3 or any S3-compatible endpoint
//! such as MinIO) and a relational backend (PostgreSQL). File content is
//! line-oriented text persisted as structured records, with create-if-absent
//! writes, line-windowed reads, in-place substring edits, and shared search
//! primitives (listing, glob, grep) that behave identically on both stores.
//!
//! ## Features
//!
//! - One async [`StorageBackend`] contract, two store-native implementations
//! - Structured results: expected conditions are values, never panics or
//!   raised errors
//! - Pooled PostgreSQL connections (deadpool) with schema migrations run by
//!   `initialize()`
//! - Fully drained paginated S3 listings behind a synchronous-looking call
//!
//! ## Example
//!
//! ```rust,ignore
//! use agentfs::{PostgresBackend, PostgresConfig, StorageBackend};
//!
//! let backend = PostgresBackend::new(PostgresConfig::default());
//! backend.initialize().await?;
//! let result = backend.write("/notes/plan.md", "# Plan\n- ship it").await?;
//! assert!(result.error.is_none());
//! backend.close().await?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// multiple_crate_versions is inherently crate-level (detects duplicate transitive dependencies).
// Cannot be moved to function level. Current duplicates: aws-sdk-s3 transitive deps.
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod models;
pub mod observability;
pub mod storage;

// Re-exports for convenience
pub use config::{PostgresConfig, S3Config};
pub use models::{
    DownloadResult, EditResult, GrepMatch, GrepResult, ListEntry, ListResult, OpError, ReadResult,
    UploadItem, VirtualPath, WriteResult,
};
pub use storage::{PostgresBackend, S3Backend, StorageBackend};

/// Error type for agentfs infrastructure faults.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// Expected per-operation conditions (missing file, existing file, ambiguous
/// edit, and so on) are **not** represented here: they are reported as
/// [`models::OpError`] values embedded in operation results. This type only
/// carries faults with no meaningful per-call recovery; callers own any
/// retry policy.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidConfig` | Malformed connection parameters, unparseable config file |
/// | `OperationFailed` | Connection refused, authentication failure, timeout, corrupt stored payload |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Configuration could not be loaded or is invalid.
    ///
    /// Raised when:
    /// - A config file cannot be read or parsed as TOML
    /// - Connection parameters are structurally invalid (e.g. empty bucket)
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An infrastructure operation failed.
    ///
    /// Raised when:
    /// - The store rejects or drops a connection
    /// - Authentication against the store fails
    /// - A query or request times out
    /// - A stored payload cannot be deserialized
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for agentfs operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Centralized so both backends stamp records identically. Uses
/// `SystemTime::now()` with fallback to 0 if the system clock is before the
/// Unix epoch.
///
/// # Examples
///
/// ```rust
/// use agentfs::current_timestamp;
///
/// let ts = current_timestamp();
/// assert!(ts > 0);
/// ```
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidConfig("empty bucket name".to_string());
        assert_eq!(err.to_string(), "invalid configuration: empty bucket name");

        let err = Error::OperationFailed {
            operation: "s3_get_object".to_string(),
            cause: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "operation 's3_get_object' failed: connection refused"
        );
    }

    #[test]
    fn test_current_timestamp_is_recent() {
        // 2023-01-01T00:00:00Z as a sanity floor
        assert!(current_timestamp() > 1_672_531_200);
    }
}
