//! Storage backend trait.
//!
//! The single contract consumed by the host agent runtime. Implementations
//! are a closed set selected at construction ([`crate::S3Backend`],
//! [`crate::PostgresBackend`]), not discovered dynamically. Expected
//! conditions are reported inside the structured results; only
//! infrastructure faults raise [`crate::Error`].

use crate::Result;
use crate::models::{
    DownloadResult, EditResult, GrepResult, ListResult, ReadResult, UploadItem, WriteResult,
};
use async_trait::async_trait;

/// Path-addressed file operations over a persistent store.
///
/// All operations are non-blocking and safe to overlap from a single
/// logical worker. The backing store is the sole arbiter of concurrent
/// writers: no in-process lock serializes operations on the same path, and
/// callers must treat `AlreadyExists` races as expected outcomes.
///
/// `initialize` and `close` must not be invoked concurrently with each
/// other on the same instance, and no operation may be issued after
/// `close` returns.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Prepares the backend for use.
    ///
    /// Idempotent: the first successful call creates whatever the store
    /// needs (schema and indexes for the relational backend, the SDK client
    /// for the object store); repeated calls are no-ops. Operations invoked
    /// before this completes report `NotInitialized`.
    async fn initialize(&self) -> Result<()>;

    /// Releases pooled resources.
    ///
    /// Safe to call when `initialize` never ran or failed partway.
    async fn close(&self) -> Result<()>;

    /// Reads a line window of a file.
    ///
    /// Each line is prefixed with its 1-based number. `offset` is the
    /// 1-based first line; `limit` caps the number of lines. An offset past
    /// the end of the file yields empty content, not an error. Reports
    /// `NotFound` when no record exists.
    async fn read(
        &self,
        path: &str,
        offset: Option<usize>,
        limit: Option<usize>,
    ) -> Result<ReadResult>;

    /// Creates a file if absent.
    ///
    /// Reports `AlreadyExists` when a record is present; overwrite goes
    /// through [`Self::edit`].
    async fn write(&self, path: &str, content: &str) -> Result<WriteResult>;

    /// Replaces occurrences of `old` with `new` in place.
    ///
    /// Reports `NotFound` when the file is missing, `NoMatch` on zero
    /// occurrences, and `AmbiguousMatch` when `old` occurs more than once
    /// without `replace_all`. With `replace_all`, every occurrence is
    /// replaced and the count reported.
    async fn edit(
        &self,
        path: &str,
        old: &str,
        new: &str,
        replace_all: bool,
    ) -> Result<EditResult>;

    /// Lists the direct children of a prefix.
    ///
    /// One level only: files deeper than the prefix collapse into
    /// synthesized directory entries. Entries come back ordered by path.
    async fn list(&self, prefix: &str) -> Result<ListResult>;

    /// Finds files under `root` matching a glob pattern.
    ///
    /// Files only, no synthesized directories. `*` matches within one
    /// segment, `**` zero or more segments, `?` one character;
    /// case-sensitive.
    async fn glob(&self, pattern: &str, root: &str) -> Result<ListResult>;

    /// Searches file content for a literal substring.
    ///
    /// Scans every line of every file under `prefix` (the whole store when
    /// omitted) whose path satisfies `file_glob`. Returns an empty match
    /// set, never an error, when nothing matches.
    async fn grep(
        &self,
        query: &str,
        prefix: Option<&str>,
        file_glob: Option<&str>,
    ) -> Result<GrepResult>;

    /// Uploads raw bytes in a batch.
    ///
    /// Items are independent: no cross-item transaction, no ordering
    /// guarantee, and a failure (including an infrastructure failure) is
    /// recorded in that item's own result rather than raised.
    async fn upload(&self, items: &[UploadItem]) -> Result<Vec<WriteResult>>;

    /// Downloads raw bytes in a batch.
    ///
    /// Items are independent; each result carries either the bytes or that
    /// item's failure.
    async fn download(&self, paths: &[String]) -> Result<Vec<DownloadResult>>;
}
