use async_trait::async_trait;
use thiserror::Error;

use crate::record::BlobId;

/// Content type assumed when the image server does not send one.
pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMeta {
    pub content_type: String,
    pub filename: String,
}

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob store error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("blob store unavailable: {0}")]
    Unavailable(String),
    #[error("blob writer already closed")]
    Closed,
}

/// Binary object store. Each `open` starts a new object.
#[async_trait]
pub trait BlobSink: Send + Sync {
    async fn open(&self, meta: BlobMeta) -> Result<Box<dyn BlobWriter>, BlobError>;
}

/// Write handle for one object. Dropping it without `close` discards the bytes.
#[async_trait]
pub trait BlobWriter: Send {
    async fn write(&mut self, chunk: &[u8]) -> Result<(), BlobError>;
    async fn close(&mut self) -> Result<BlobId, BlobError>;
}

/// Final path segment of `url`, query and fragment removed.
pub fn filename_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    match path.rsplit('/').next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => "image.jpg".to_string(),
    }
}
