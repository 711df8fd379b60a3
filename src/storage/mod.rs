//! Storage layer abstraction.
//!
//! One uniform contract, two store-native implementations:
//! - **S3**: one object per file at key = prefix + virtual path
//! - **PostgreSQL**: one row per file keyed by path, pooled connections
//!
//! The codec, pattern engine, and listing helpers are shared so every
//! operation behaves identically regardless of which store backs it.

pub mod codec;
pub mod listing;
pub mod migrations;
pub mod pattern;
pub mod postgres;
pub mod s3;
pub mod traits;

pub use postgres::PostgresBackend;
pub use s3::S3Backend;
pub use traits::StorageBackend;
