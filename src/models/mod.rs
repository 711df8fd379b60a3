//! Data models for agentfs.
//!
//! This module contains the virtual path type and the structured result
//! types returned by every backend operation.

mod path;
mod results;

pub use path::VirtualPath;
pub use results::{
    DownloadResult, EditResult, GrepMatch, GrepResult, ListEntry, ListResult, OpError, ReadResult,
    UploadItem, WriteResult,
};
