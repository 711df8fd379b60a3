//! S3 integration tests.
//!
//! Exercises the object-store backend against a live S3-compatible
//! endpoint (MinIO in CI). The bucket must already exist; each test scopes
//! itself under a unique key prefix for isolation.
//!
//! These tests require a running endpoint. Set `AGENTFS_TEST_S3_ENDPOINT`
//! to enable them:
//!
//! ```bash
//! export AGENTFS_TEST_S3_ENDPOINT=http://localhost:9000
//! cargo test --test s3_integration
//! ```
//!
//! `AGENTFS_TEST_S3_BUCKET` (default `test-bucket`),
//! `AGENTFS_TEST_S3_ACCESS_KEY` and `AGENTFS_TEST_S3_SECRET_KEY` (default
//! `minioadmin`/`minioadmin`) override the connection defaults.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::print_stderr
)]

use agentfs::models::OpError;
use agentfs::{S3Backend, S3Config, StorageBackend, UploadItem};
use std::env;
use uuid::Uuid;

/// Environment variable gating these tests.
const S3_ENDPOINT_ENV: &str = "AGENTFS_TEST_S3_ENDPOINT";

/// Builds a test configuration with a unique prefix, or `None` to skip.
fn test_config() -> Option<S3Config> {
    let endpoint = env::var(S3_ENDPOINT_ENV).ok()?;

    let bucket =
        env::var("AGENTFS_TEST_S3_BUCKET").unwrap_or_else(|_| "test-bucket".to_string());
    let access_key =
        env::var("AGENTFS_TEST_S3_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".to_string());
    let secret_key =
        env::var("AGENTFS_TEST_S3_SECRET_KEY").unwrap_or_else(|_| "minioadmin".to_string());

    Some(
        S3Config::default()
            .with_bucket(bucket)
            .with_prefix(format!("test-run-{}", Uuid::new_v4().simple()))
            .with_endpoint_url(endpoint)
            .with_region("us-east-1")
            .with_credentials(access_key, secret_key),
    )
}

/// Macro to skip tests when no S3 endpoint is available.
macro_rules! require_backend {
    () => {
        match test_config() {
            Some(config) => {
                let backend = S3Backend::new(config);
                backend.initialize().await.expect("initialize");
                backend
            }
            None => {
                eprintln!(
                    "Skipping test: {} not set. Set this environment variable to run S3 tests.",
                    S3_ENDPOINT_ENV
                );
                return;
            }
        }
    };
}

#[tokio::test]
async fn test_full_lifecycle() {
    let backend = require_backend!();

    // 1. Write
    let write = backend
        .write("/hello.txt", "Hello World\nLine 2")
        .await
        .expect("write");
    assert!(write.error.is_none());
    assert_eq!(write.path, "/hello.txt");

    // 2. Read
    let read = backend.read("/hello.txt", None, None).await.expect("read");
    assert!(read.content.contains("Hello World"));
    assert!(read.content.contains("Line 2"));

    // 3. List
    let listing = backend.list("/").await.expect("list");
    assert!(listing.entries.iter().any(|e| e.path == "/hello.txt"));

    // 4. Edit
    let edit = backend
        .edit("/hello.txt", "World", "Integration", false)
        .await
        .expect("edit");
    assert!(edit.error.is_none());
    assert_eq!(edit.occurrences, 1);

    let read = backend.read("/hello.txt", None, None).await.expect("read");
    assert!(read.content.contains("Hello Integration"));

    backend.close().await.expect("close");
}

#[tokio::test]
async fn test_write_conflict_preserves_original() {
    let backend = require_backend!();

    backend
        .write("/once.txt", "original")
        .await
        .expect("first write");
    let second = backend
        .write("/once.txt", "other")
        .await
        .expect("second write");
    assert_eq!(
        second.error,
        Some(OpError::AlreadyExists {
            path: "/once.txt".to_string()
        })
    );

    let read = backend.read("/once.txt", None, None).await.expect("read");
    assert!(read.content.contains("original"));

    backend.close().await.expect("close");
}

#[tokio::test]
async fn test_read_missing_reports_not_found() {
    let backend = require_backend!();

    let read = backend
        .read("/nonexistent.txt", None, None)
        .await
        .expect("read");
    assert_eq!(
        read.error,
        Some(OpError::NotFound {
            path: "/nonexistent.txt".to_string()
        })
    );

    backend.close().await.expect("close");
}

#[tokio::test]
async fn test_list_synthesizes_directories() {
    let backend = require_backend!();

    backend.write("/a.txt", "top").await.expect("write");
    backend.write("/dir/b.txt", "nested").await.expect("write");

    let listing = backend.list("/").await.expect("list");
    let paths: Vec<&str> = listing.entries.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["/a.txt", "/dir/"]);
    assert!(listing.entries[1].is_directory);

    backend.close().await.expect("close");
}

#[tokio::test]
async fn test_glob() {
    let backend = require_backend!();

    backend
        .write("/src/main.py", "print('hello')")
        .await
        .expect("write");
    backend
        .write("/src/utils.py", "def util(): pass")
        .await
        .expect("write");
    backend.write("/README.md", "# Readme").await.expect("write");

    let results = backend.glob("*.py", "/src").await.expect("glob");
    let mut paths: Vec<&str> = results.entries.iter().map(|e| e.path.as_str()).collect();
    paths.sort_unstable();
    assert_eq!(paths, vec!["/src/main.py", "/src/utils.py"]);

    backend.close().await.expect("close");
}

#[tokio::test]
async fn test_grep() {
    let backend = require_backend!();

    backend
        .write("/grep_me.txt", "match this pattern\ndon't match this")
        .await
        .expect("write");

    let result = backend.grep("pattern", None, None).await.expect("grep");
    assert_eq!(result.matches.len(), 1);
    assert_eq!(result.matches[0].text, "match this pattern");
    assert_eq!(result.matches[0].line, 1);

    backend.close().await.expect("close");
}

#[tokio::test]
async fn test_upload_download_round_trip() {
    let backend = require_backend!();

    let raw: Vec<u8> = vec![0xde, 0xad, 0xbe, 0xef, 0x00, 0xff];
    let items = vec![
        UploadItem::new("/data/config.json", br#"{"version": 1}"#.to_vec()),
        UploadItem::new("/data/blob.bin", raw.clone()),
        UploadItem::new("/data/../escape.txt", b"nope".to_vec()),
    ];
    let results = backend.upload(&items).await.expect("upload");
    assert!(results[0].error.is_none());
    assert!(results[1].error.is_none());
    assert!(matches!(
        results[2].error,
        Some(OpError::InvalidPath { .. })
    ));

    let downloads = backend
        .download(&[
            "/data/config.json".to_string(),
            "/data/blob.bin".to_string(),
        ])
        .await
        .expect("download");
    assert_eq!(downloads[0].bytes.as_deref(), Some(br#"{"version": 1}"#.as_slice()));
    assert_eq!(downloads[1].bytes.as_deref(), Some(raw.as_slice()));

    backend.close().await.expect("close");
}

#[tokio::test]
async fn test_operations_after_close_report_not_initialized() {
    let backend = require_backend!();

    backend.close().await.expect("close");
    let write = backend.write("/late.txt", "data").await.expect("write");
    assert_eq!(write.error, Some(OpError::NotInitialized));
}
