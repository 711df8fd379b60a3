//! S3-backed storage.
//!
//! Maps each virtual path to an object key under the configured prefix and
//! stores the full JSON payload as the object body. Existence checks are a
//! `HeadObject` probe before write and edit; the store's consistency model
//! is accepted as-is (same-session read-after-write is visible, cross-
//! session visibility may lag, and no linearizability is assumed).
//!
//! Listing and glob enumerate keys with `ListObjectsV2`, draining every
//! result page before returning. Grep fetches and scans each file body
//! individually; no server-side search capability is assumed.

use crate::config::S3Config;
use crate::models::{
    DownloadResult, EditResult, GrepMatch, GrepResult, ListResult, OpError, ReadResult, UploadItem,
    VirtualPath, WriteResult,
};
use crate::storage::codec::{self, FileBody, FilePayload};
use crate::storage::listing::{self, FileMeta};
use crate::storage::pattern::{FileFilter, GlobMatcher, grep_scan};
use crate::storage::traits::StorageBackend;
use crate::{Error, Result, current_timestamp};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use futures::future::join_all;
use tokio::sync::RwLock;

/// S3-backed storage backend.
///
/// Construction holds configuration only; [`StorageBackend::initialize`]
/// builds the SDK client. Operations issued before that report
/// `NotInitialized` in their result.
pub struct S3Backend {
    /// Connection parameters.
    config: S3Config,
    /// SDK client, populated by `initialize()`.
    client: RwLock<Option<Client>>,
}

/// Helper to map SDK errors with full error-chain context.
fn sdk_error(op: &str, e: impl std::error::Error) -> Error {
    Error::OperationFailed {
        operation: op.to_string(),
        cause: format!("{}", DisplayErrorContext(&e)),
    }
}

impl S3Backend {
    /// Creates a new S3 backend holding configuration only.
    #[must_use]
    pub const fn new(config: S3Config) -> Self {
        Self {
            config,
            client: RwLock::const_new(None),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &S3Config {
        &self.config
    }

    /// Builds the SDK client from the connection parameters.
    async fn build_client(config: &S3Config) -> Client {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let (Some(key), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                key.clone(),
                secret.clone(),
                None,
                None,
                "agentfs-config",
            ));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint.clone());
        }
        // MinIO and most S3-compatible endpoints require path-style addressing
        builder = builder.force_path_style(config.force_path_style);

        Client::from_conf(builder.build())
    }

    /// Returns a clone of the client when initialized.
    async fn client(&self) -> Option<Client> {
        self.client.read().await.clone()
    }

    /// Physical object key for a virtual path.
    fn key_of(&self, path: &VirtualPath) -> String {
        path.storage_key(&self.config.prefix)
    }

    /// Physical key prefix enumerating a virtual directory.
    fn key_prefix_of(&self, dir: &VirtualPath) -> String {
        let relative = listing::dir_prefix(dir);
        let relative = relative.trim_start_matches('/');
        let prefix = self.config.prefix.trim_matches('/');
        if prefix.is_empty() {
            relative.to_string()
        } else {
            format!("{prefix}/{relative}")
        }
    }

    /// Virtual path for a physical object key.
    fn virtual_path_of(&self, key: &str) -> String {
        let prefix = self.config.prefix.trim_matches('/');
        let relative = if prefix.is_empty() {
            key
        } else {
            key.strip_prefix(prefix)
                .map_or(key, |rest| rest.trim_start_matches('/'))
        };
        format!("/{relative}")
    }

    /// Whether an object exists, via a metadata probe.
    async fn exists(&self, client: &Client, key: &str) -> Result<bool> {
        match client
            .head_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    Ok(false)
                } else {
                    Err(sdk_error("s3_head_object", err))
                }
            }
        }
    }

    /// Fetches and decodes the payload for a key, when the object exists.
    async fn fetch_payload(&self, client: &Client, key: &str) -> Result<Option<FilePayload>> {
        let output = match client
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    return Ok(None);
                }
                return Err(sdk_error("s3_get_object", err));
            }
        };

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| Error::OperationFailed {
                operation: "s3_read_body".to_string(),
                cause: e.to_string(),
            })?
            .into_bytes();

        let payload: FilePayload =
            serde_json::from_slice(&bytes).map_err(|e| Error::OperationFailed {
                operation: "s3_decode_payload".to_string(),
                cause: e.to_string(),
            })?;
        Ok(Some(payload))
    }

    /// Serializes and stores a payload at a key.
    async fn put_payload(&self, client: &Client, key: &str, payload: &FilePayload) -> Result<()> {
        let bytes = serde_json::to_vec(payload).map_err(|e| Error::OperationFailed {
            operation: "s3_encode_payload".to_string(),
            cause: e.to_string(),
        })?;

        client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .content_type("application/json")
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|err| sdk_error("s3_put_object", err))?;
        Ok(())
    }

    /// Enumerates every stored file under a virtual directory, draining all
    /// result pages before returning.
    async fn files_under(&self, client: &Client, dir: &VirtualPath) -> Result<Vec<FileMeta>> {
        let mut files = Vec::new();
        let mut pages = client
            .list_objects_v2()
            .bucket(&self.config.bucket)
            .prefix(self.key_prefix_of(dir))
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| sdk_error("s3_list_objects", err))?;
            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                let size = u64::try_from(object.size().unwrap_or(0)).unwrap_or(0);
                let modified_at = object
                    .last_modified()
                    .and_then(|dt| u64::try_from(dt.secs()).ok());
                files.push(FileMeta {
                    path: self.virtual_path_of(key),
                    size,
                    modified_at,
                });
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    /// Create-if-absent write of an encoded body.
    ///
    /// The existence probe preceding the put is a known check-then-act
    /// window; the store's own atomicity primitives are the only stronger
    /// guard available, and callers must treat racing `AlreadyExists`
    /// outcomes as expected.
    async fn write_body(
        &self,
        client: &Client,
        vpath: &VirtualPath,
        body: FileBody,
        size: u64,
    ) -> Result<WriteResult> {
        let key = self.key_of(vpath);
        if self.exists(client, &key).await? {
            let path = vpath.to_string();
            return Ok(WriteResult::err(path.clone(), OpError::AlreadyExists { path }));
        }

        let now = current_timestamp();
        let payload = FilePayload {
            body,
            created_at: now,
            modified_at: now,
        };
        self.put_payload(client, &key, &payload).await?;
        Ok(WriteResult::ok(vpath.to_string(), size))
    }

    /// Uploads one batch item, isolating every failure into the result.
    async fn upload_one(&self, item: &UploadItem) -> WriteResult {
        let vpath = match VirtualPath::parse(&item.path) {
            Ok(p) => p,
            Err(e) => return WriteResult::err(item.path.clone(), e),
        };
        let Some(client) = self.client().await else {
            return WriteResult::err(vpath.to_string(), OpError::NotInitialized);
        };

        let body = codec::encode_bytes(&item.bytes);
        match self
            .write_body(&client, &vpath, body, item.bytes.len() as u64)
            .await
        {
            Ok(result) => result,
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
        let Some(client) = self.client().await else {
            return DownloadResult::err(vpath.to_string(), OpError::NotInitialized);
        };

        match self.fetch_payload(&client, &self.key_of(&vpath)).await {
            Ok(Some(payload)) => match codec::decode_bytes(&payload.body) {
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
impl StorageBackend for S3Backend {
    async fn initialize(&self) -> Result<()> {
        let mut guard = self.client.write().await;
        if guard.is_some() {
            return Ok(());
        }

        self.config.validate()?;
        let client = Self::build_client(&self.config).await;

        tracing::info!(
            bucket = self.config.bucket,
            prefix = self.config.prefix,
            "S3 backend initialized"
        );
        *guard = Some(client);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.client.write().await;
        if guard.take().is_some() {
            tracing::debug!(bucket = self.config.bucket, "S3 client released");
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
        let Some(client) = self.client().await else {
            return Ok(ReadResult::err(vpath.to_string(), OpError::NotInitialized));
        };

        match self.fetch_payload(&client, &self.key_of(&vpath)).await? {
            Some(payload) => {
                let lines = codec::body_lines(&payload.body);
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
        let Some(client) = self.client().await else {
            return Ok(WriteResult::err(vpath.to_string(), OpError::NotInitialized));
        };

        let body = codec::encode_text(content);
        self.write_body(&client, &vpath, body, content.len() as u64)
            .await
    }

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
        let Some(client) = self.client().await else {
            return Ok(EditResult::err(vpath.to_string(), OpError::NotInitialized));
        };

        let key = self.key_of(&vpath);
        let Some(payload) = self.fetch_payload(&client, &key).await? else {
            let path = vpath.to_string();
            return Ok(EditResult::err(path.clone(), OpError::NotFound { path }));
        };

        let text = codec::decode_text(&payload.body);
        let (updated, occurrences) =
            match codec::edit_text(vpath.as_str(), &text, old, new, replace_all) {
                Ok(result) => result,
                Err(e) => return Ok(EditResult::err(vpath.to_string(), e)),
            };

        let new_payload = FilePayload {
            body: codec::encode_text(&updated),
            created_at: payload.created_at,
            modified_at: current_timestamp(),
        };
        self.put_payload(&client, &key, &new_payload).await?;

        Ok(EditResult::ok(vpath.to_string(), occurrences))
    }

    async fn list(&self, prefix: &str) -> Result<ListResult> {
        let prefix = match VirtualPath::parse_prefix(prefix) {
            Ok(p) => p,
            Err(e) => return Ok(ListResult::err(e)),
        };
        let Some(client) = self.client().await else {
            return Ok(ListResult::err(OpError::NotInitialized));
        };

        let files = self.files_under(&client, &prefix).await?;
        Ok(ListResult::ok(listing::direct_children(&prefix, &files)))
    }

    async fn glob(&self, pattern: &str, root: &str) -> Result<ListResult> {
        let root = match VirtualPath::parse_prefix(root) {
            Ok(p) => p,
            Err(e) => return Ok(ListResult::err(e)),
        };
        let Some(client) = self.client().await else {
            return Ok(ListResult::err(OpError::NotInitialized));
        };

        let matcher = GlobMatcher::new(pattern)?;
        let files = self.files_under(&client, &root).await?;
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
        let Some(client) = self.client().await else {
            return Ok(GrepResult::err(OpError::NotInitialized));
        };

        let filter = match file_glob {
            Some(pattern) => Some(FileFilter::new(pattern)?),
            None => None,
        };

        let prefix_str = listing::dir_prefix(&prefix);
        let files = self.files_under(&client, &prefix).await?;

        let mut matches = Vec::new();
        for file in &files {
            let relative = file.path.strip_prefix(&prefix_str).unwrap_or(&file.path);
            let file_name = file.path.rsplit('/').next().unwrap_or("");
            if let Some(filter) = &filter {
                if !filter.matches(relative, file_name) {
                    continue;
                }
            }

            let vpath = match VirtualPath::parse(&file.path) {
                Ok(p) => p,
                Err(_) => continue,
            };
            // An object deleted between listing and fetch is not a match
            let Some(payload) = self.fetch_payload(&client, &self.key_of(&vpath)).await? else {
                continue;
            };

            let lines = codec::body_lines(&payload.body);
            for (line, text) in grep_scan(&lines, query) {
                matches.push(GrepMatch {
                    path: file.path.clone(),
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
