//! PostgreSQL-backed storage.
//!
//! Maps each virtual path to the primary key of a single table. The unique
//! constraint on `path` is the authoritative create-if-absent guard: writes
//! use `INSERT ... ON CONFLICT DO NOTHING`, so a losing concurrent writer
//! observes `AlreadyExists` instead of racing a separate existence probe.
//!
//! Listing and glob use a prefix predicate on the path column; grep scans
//! row content in-process so search semantics stay identical to the
//! object-store backend, with no dependency on full-text indexing.

use crate::config::PostgresConfig;
use crate::models::{
    DownloadResult, EditResult, GrepMatch, GrepResult, ListResult, OpError, ReadResult, UploadItem,
    VirtualPath, WriteResult,
};
use crate::storage::codec::{self, FileBody};
use crate::storage::listing::{self, FileMeta};
use crate::storage::migrations::{Migration, MigrationRunner};
use crate::storage::pattern::{FileFilter, GlobMatcher, grep_scan};
use crate::storage::traits::StorageBackend;
use crate::{Error, Result, current_timestamp};
use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use futures::future::join_all;
use tokio::sync::RwLock;
use tokio_postgres::NoTls;

/// Embedded migrations compiled into the binary.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial file table",
        sql: r"
            CREATE TABLE IF NOT EXISTS {table} (
                path TEXT PRIMARY KEY,
                content JSONB NOT NULL,
                size BIGINT NOT NULL,
                created_at BIGINT NOT NULL,
                modified_at BIGINT NOT NULL
            );
        ",
    },
    Migration {
        version: 2,
        description: "Add path prefix index for listings",
        sql: r"
            CREATE INDEX IF NOT EXISTS idx_{table}_path_prefix ON {table} (path text_pattern_ops);
        ",
    },
];

/// PostgreSQL-backed storage backend.
///
/// Construction holds configuration only; [`StorageBackend::initialize`]
/// builds the connection pool and applies schema migrations. Operations
/// issued before that report `NotInitialized` in their result.
pub struct PostgresBackend {
    /// Connection parameters.
    config: PostgresConfig,
    /// Connection pool, populated by `initialize()`.
    pool: RwLock<Option<Pool>>,
}

/// Helper to map pool acquisition errors.
fn pool_error(e: impl std::fmt::Display) -> Error {
    Error::OperationFailed {
        operation: "postgres_get_client".to_string(),
        cause: e.to_string(),
    }
}

/// Helper to map query errors.
fn query_error(op: &str, e: impl std::fmt::Display) -> Error {
    Error::OperationFailed {
        operation: op.to_string(),
        cause: e.to_string(),
    }
}

/// Escapes LIKE metacharacters so a path prefix matches literally.
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

impl PostgresBackend {
    /// Creates a new PostgreSQL backend holding configuration only.
    #[must_use]
    pub const fn new(config: PostgresConfig) -> Self {
        Self {
            config,
            pool: RwLock::const_new(None),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &PostgresConfig {
        &self.config
    }

    /// Builds the deadpool config from the connection parameters.
    ///
    /// Pool exhaustion blocks the caller: no acquire timeout is set unless
    /// the configuration provides one.
    fn build_pool_config(config: &PostgresConfig) -> Config {
        let mut cfg = Config::new();
        cfg.host = Some(config.host.clone());
        cfg.port = Some(config.port);
        cfg.dbname = Some(config.database.clone());
        cfg.user = Some(config.user.clone());
        cfg.password = Some(config.password.clone());

        if config.schema != "public" {
            cfg.options = Some(format!("-c search_path={}", config.schema));
        }

        cfg.pool = Some(deadpool_postgres::PoolConfig {
            max_size: config.max_pool_size,
            timeouts: deadpool_postgres::Timeouts {
                wait: config.pool_timeout,
                ..Default::default()
            },
            ..Default::default()
        });

        // Fast recycling reuses connections without a round-trip check
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        cfg
    }

    /// Returns a clone of the pool when initialized.
    async fn pool(&self) -> Option<Pool> {
        self.pool.read().await.clone()
    }

    /// Acquires a pooled client.
    async fn client(pool: &Pool) -> Result<deadpool_postgres::Object> {
        pool.get().await.map_err(pool_error)
    }

    /// Fetches the content body for a path, when the record exists.
    async fn fetch_body(&self, pool: &Pool, path: &VirtualPath) -> Result<Option<FileBody>> {
        let client = Self::client(pool).await?;
        let sql = format!(
            "SELECT content FROM {} WHERE path = $1",
            self.config.table
        );
        let row = client
            .query_opt(&sql, &[&path.as_str()])
            .await
            .map_err(|e| query_error("postgres_fetch", e))?;

        row.map(|r| {
            let value: serde_json::Value = r.get("content");
            serde_json::from_value::<FileBody>(value).map_err(|e| Error::OperationFailed {
                operation: "postgres_decode_payload".to_string(),
                cause: e.to_string(),
            })
        })
        .transpose()
    }

    /// Inserts a record if absent; returns whether the insert won.
    ///
    /// `ON CONFLICT (path) DO NOTHING` makes the primary key the
    /// authoritative guard, so a concurrent writer losing the race sees
    /// zero affected rows rather than a raised constraint violation.
    #[allow(clippy::cast_possible_wrap)]
    async fn insert_record(
        &self,
        pool: &Pool,
        path: &VirtualPath,
        body: &FileBody,
        size: u64,
        now: u64,
    ) -> Result<bool> {
        let client = Self::client(pool).await?;
        let sql = format!(
            r"INSERT INTO {} (path, content, size, created_at, modified_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (path) DO NOTHING",
            self.config.table
        );

        let content_json = serde_json::to_value(body).map_err(|e| Error::OperationFailed {
            operation: "postgres_encode_payload".to_string(),
            cause: e.to_string(),
        })?;

        let rows = client
            .execute(
                &sql,
                &[
                    &path.as_str(),
                    &content_json,
                    &(size as i64),
                    &(now as i64),
                    &(now as i64),
                ],
            )
            .await
            .map_err(|e| query_error("postgres_insert", e))?;

        Ok(rows > 0)
    }

    /// Enumerates every stored file under a directory-style prefix.
    #[allow(clippy::cast_sign_loss)]
    async fn files_under(&self, pool: &Pool, prefix: &VirtualPath) -> Result<Vec<FileMeta>> {
        let client = Self::client(pool).await?;
        let like = format!("{}%", escape_like(&listing::dir_prefix(prefix)));
        let sql = format!(
            "SELECT path, size, modified_at FROM {} WHERE path LIKE $1 ORDER BY path",
            self.config.table
        );

        let rows = client
            .query(&sql, &[&like])
            .await
            .map_err(|e| query_error("postgres_list", e))?;

        Ok(rows
            .iter()
            .map(|row| {
                let path: String = row.get("path");
                let size: i64 = row.get("size");
                let modified_at: i64 = row.get("modified_at");
                FileMeta {
                    path,
                    size: size as u64,
                    modified_at: Some(modified_at as u64),
                }
            })
            .collect())
    }

    /// Uploads one batch item, isolating every failure into the result.
    async fn upload_one(&self, item: &UploadItem) -> WriteResult {
        let vpath = match VirtualPath::parse(&item.path) {
            Ok(p) => p,
            Err(e) => return WriteResult::err(item.path.clone(), e),
        };
        let Some(pool) = self.pool().await else {
            return WriteResult::err(vpath.to_string(), OpError::NotInitialized);
        };

        let body = codec::encode_bytes(&item.bytes);
        let size = item.bytes.len() as u64;
        match self
            .insert_record(&pool, &vpath, &body, size, current_timestamp())
            .await
        {
            Ok(true) => WriteResult::ok(vpath.to_string(), size),
            Ok(false) => {
                let path = vpath.to_string();
                WriteResult::err(path.clone(), OpError::AlreadyExists { path })
            }
            Err(e) => WriteResult::err(
                vpath.to_string(),
                OpError::Infrastructure {
                    message: e.to_string(),
                },
            ),
        }
    }

    /// Downloads one batch item, isolating every failure into the result.
    async fn download_one(&self, path: &str) -> DownloadResult {
        let vpath = match VirtualPath::parse(path) {
            Ok(p) => p,
            Err(e) => return DownloadResult::err(path.to_string(), e),
        };
        let Some(pool) = self.pool().await else {
            return DownloadResult::err(vpath.to_string(), OpError::NotInitialized);
        };

        match self.fetch_body(&pool, &vpath).await {
            Ok(Some(body)) => match codec::decode_bytes(&body) {
                Ok(bytes) => DownloadResult::ok(vpath.to_string(), bytes),
                Err(e) => DownloadResult::err(
                    vpath.to_string(),
                    OpError::Infrastructure {
                        message: e.to_string(),
                    },
                ),
            },
            Ok(None) => {
                let path = vpath.to_string();
                DownloadResult::err(path.clone(), OpError::NotFound { path })
            }
            Err(e) => DownloadResult::err(
                vpath.to_string(),
                OpError::Infrastructure {
                    message: e.to_string(),
                },
            ),
        }
    }
}

#[async_trait]
impl StorageBackend for PostgresBackend {
    async fn initialize(&self) -> Result<()> {
        let mut guard = self.pool.write().await;
        if guard.is_some() {
            return Ok(());
        }

        self.config.validate()?;

        let cfg = Self::build_pool_config(&self.config);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| Error::OperationFailed {
                operation: "postgres_create_pool".to_string(),
                cause: e.to_string(),
            })?;

        let runner = MigrationRunner::new(pool.clone(), self.config.table.clone());
        if let Err(e) = runner.run(MIGRATIONS).await {
            // Release the half-built pool so a failed initialization
            // leaves nothing behind.
            pool.close();
            return Err(e);
        }

        tracing::info!(
            table = self.config.table,
            max_pool_size = self.config.max_pool_size,
            "PostgreSQL backend initialized"
        );
        *guard = Some(pool);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.pool.write().await;
        if let Some(pool) = guard.take() {
            pool.close();
            tracing::debug!(table = self.config.table, "PostgreSQL pool closed");
        }
        Ok(())
    }

    async fn read(
        &self,
        path: &str,
        offset: Option<usize>,
        limit: Option<usize>,
    ) -> Result<ReadResult> {
        let vpath = match VirtualPath::parse(path) {
            Ok(p) => p,
            Err(e) => return Ok(ReadResult::err(path.to_string(), e)),
        };
        let Some(pool) = self.pool().await else {
            return Ok(ReadResult::err(vpath.to_string(), OpError::NotInitialized));
        };

        match self.fetch_body(&pool, &vpath).await? {
            Some(body) => {
                let lines = codec::body_lines(&body);
                Ok(ReadResult::ok(
                    vpath.to_string(),
                    codec::render_numbered(&lines, offset, limit),
                ))
            }
            None => {
                let path = vpath.to_string();
                Ok(ReadResult::err(path.clone(), OpError::NotFound { path }))
            }
        }
    }

    async fn write(&self, path: &str, content: &str) -> Result<WriteResult> {
        let vpath = match VirtualPath::parse(path) {
            Ok(p) => p,
            Err(e) => return Ok(WriteResult::err(path.to_string(), e)),
        };
        let Some(pool) = self.pool().await else {
            return Ok(WriteResult::err(vpath.to_string(), OpError::NotInitialized));
        };

        let body = codec::encode_text(content);
        let size = content.len() as u64;
        if self
            .insert_record(&pool, &vpath, &body, size, current_timestamp())
            .await?
        {
            Ok(WriteResult::ok(vpath.to_string(), size))
        } else {
            let path = vpath.to_string();
            Ok(WriteResult::err(path.clone(), OpError::AlreadyExists { path }))
        }
    }

    #[allow(clippy::cast_possible_wrap)]
    async fn edit(
        &self,
        path: &str,
        old: &str,
        new: &str,
        replace_all: bool,
    ) -> Result<EditResult> {
        let vpath = match VirtualPath::parse(path) {
            Ok(p) => p,
            Err(e) => return Ok(EditResult::err(path.to_string(), e)),
        };
        let Some(pool) = self.pool().await else {
            return Ok(EditResult::err(vpath.to_string(), OpError::NotInitialized));
        };

        let Some(body) = self.fetch_body(&pool, &vpath).await? else {
            let path = vpath.to_string();
            return Ok(EditResult::err(path.clone(), OpError::NotFound { path }));
        };

        let text = codec::decode_text(&body);
        let (updated, occurrences) =
            match codec::edit_text(vpath.as_str(), &text, old, new, replace_all) {
                Ok(result) => result,
                Err(e) => return Ok(EditResult::err(vpath.to_string(), e)),
            };

        let new_body = codec::encode_text(&updated);
        let content_json =
            serde_json::to_value(&new_body).map_err(|e| Error::OperationFailed {
                operation: "postgres_encode_payload".to_string(),
                cause: e.to_string(),
            })?;

        let client = Self::client(&pool).await?;
        let sql = format!(
            "UPDATE {} SET content = $2, size = $3, modified_at = $4 WHERE path = $1",
            self.config.table
        );
        client
            .execute(
                &sql,
                &[
                    &vpath.as_str(),
                    &content_json,
                    &(updated.len() as i64),
                    &(current_timestamp() as i64),
                ],
            )
            .await
            .map_err(|e| query_error("postgres_update", e))?;

        Ok(EditResult::ok(vpath.to_string(), occurrences))
    }

    async fn list(&self, prefix: &str) -> Result<ListResult> {
        let prefix = match VirtualPath::parse_prefix(prefix) {
            Ok(p) => p,
            Err(e) => return Ok(ListResult::err(e)),
        };
        let Some(pool) = self.pool().await else {
            return Ok(ListResult::err(OpError::NotInitialized));
        };

        let files = self.files_under(&pool, &prefix).await?;
        Ok(ListResult::ok(listing::direct_children(&prefix, &files)))
    }

    async fn glob(&self, pattern: &str, root: &str) -> Result<ListResult> {
        let root = match VirtualPath::parse_prefix(root) {
            Ok(p) => p,
            Err(e) => return Ok(ListResult::err(e)),
        };
        let Some(pool) = self.pool().await else {
            return Ok(ListResult::err(OpError::NotInitialized));
        };

        let matcher = GlobMatcher::new(pattern)?;
        let files = self.files_under(&pool, &root).await?;
        Ok(ListResult::ok(listing::glob_entries(&root, &matcher, &files)))
    }

    async fn grep(
        &self,
        query: &str,
        prefix: Option<&str>,
        file_glob: Option<&str>,
    ) -> Result<GrepResult> {
        let prefix = match VirtualPath::parse_prefix(prefix.unwrap_or("/")) {
            Ok(p) => p,
            Err(e) => return Ok(GrepResult::err(e)),
        };
        let Some(pool) = self.pool().await else {
            return Ok(GrepResult::err(OpError::NotInitialized));
        };

        let filter = match file_glob {
            Some(pattern) => Some(FileFilter::new(pattern)?),
            None => None,
        };

        let client = Self::client(&pool).await?;
        let like = format!("{}%", escape_like(&listing::dir_prefix(&prefix)));
        let sql = format!(
            "SELECT path, content FROM {} WHERE path LIKE $1 ORDER BY path",
            self.config.table
        );
        let rows = client
            .query(&sql, &[&like])
            .await
            .map_err(|e| query_error("postgres_grep", e))?;

        let prefix_str = listing::dir_prefix(&prefix);
        let mut matches = Vec::new();
        for row in &rows {
            let path: String = row.get("path");
            let relative = path.strip_prefix(&prefix_str).unwrap_or(&path);
            let file_name = path.rsplit('/').next().unwrap_or("");
            if let Some(filter) = &filter {
                if !filter.matches(relative, file_name) {
                    continue;
                }
            }

            let value: serde_json::Value = row.get("content");
            let body: FileBody =
                serde_json::from_value(value).map_err(|e| Error::OperationFailed {
                    operation: "postgres_decode_payload".to_string(),
                    cause: e.to_string(),
                })?;
            let lines = codec::body_lines(&body);
            for (line, text) in grep_scan(&lines, query) {
                matches.push(GrepMatch {
                    path: path.clone(),
                    line,
                    text,
                });
            }
        }

        Ok(GrepResult::ok(matches))
    }

    async fn upload(&self, items: &[UploadItem]) -> Result<Vec<WriteResult>> {
        Ok(join_all(items.iter().map(|item| self.upload_one(item))).await)
    }

    async fn download(&self, paths: &[String]) -> Result<Vec<DownloadResult>> {
        Ok(join_all(paths.iter().map(|path| self.download_one(path))).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("/a_b/c%d"), "/a\\_b/c\\%d");
        assert_eq!(escape_like("/plain/path"), "/plain/path");
    }

    #[tokio::test]
    async fn test_operations_before_initialize_report_not_initialized() {
        let backend = PostgresBackend::new(PostgresConfig::default());

        let read = backend.read("/a.txt", None, None).await.unwrap();
        assert_eq!(read.error, Some(OpError::NotInitialized));

        let write = backend.write("/a.txt", "content").await.unwrap();
        assert_eq!(write.error, Some(OpError::NotInitialized));

        let edit = backend.edit("/a.txt", "x", "y", false).await.unwrap();
        assert_eq!(edit.error, Some(OpError::NotInitialized));

        let list = backend.list("/").await.unwrap();
        assert_eq!(list.error, Some(OpError::NotInitialized));

        let glob = backend.glob("*.txt", "/").await.unwrap();
        assert_eq!(glob.error, Some(OpError::NotInitialized));

        let grep = backend.grep("needle", None, None).await.unwrap();
        assert_eq!(grep.error, Some(OpError::NotInitialized));
    }

    #[tokio::test]
    async fn test_invalid_path_reported_before_initialization_check() {
        let backend = PostgresBackend::new(PostgresConfig::default());
        let result = backend.read("/a/../b.txt", None, None).await.unwrap();
        assert!(matches!(result.error, Some(OpError::InvalidPath { .. })));
    }

    #[tokio::test]
    async fn test_close_without_initialize_is_safe() {
        let backend = PostgresBackend::new(PostgresConfig::default());
        backend.close().await.unwrap();
        backend.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_batch_items_isolated_before_initialize() {
        let backend = PostgresBackend::new(PostgresConfig::default());
        let items = vec![
            UploadItem::new("/ok.txt", b"fine".to_vec()),
            UploadItem::new("/bad/../x.txt", b"nope".to_vec()),
        ];

        let results = backend.upload(&items).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].error, Some(OpError::NotInitialized));
        assert!(matches!(
            results[1].error,
            Some(OpError::InvalidPath { .. })
        ));
    }
}
