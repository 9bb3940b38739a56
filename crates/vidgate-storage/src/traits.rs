//! Storage abstraction trait

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<StorageError> for vidgate_core::AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => vidgate_core::AppError::NotFound(key),
            other => vidgate_core::AppError::Store(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Chunked byte stream returned by [`Storage::download_stream`].
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Object store abstraction.
///
/// All backends must implement this trait so the upload pipeline and the
/// transcode orchestrator never couple to a concrete store. Streaming methods
/// exist so large objects move through a bounded buffer; when the sink cannot
/// accept more data the read side awaits, which is what bounds memory.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upload a small object (playlists, thumbnails) to a specific key.
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Upload from an async reader without loading the object into memory.
    /// Returns the number of bytes written.
    async fn upload_stream_with_key(
        &self,
        storage_key: &str,
        content_type: &str,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<u64>;

    /// Download a small object fully into memory.
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Download as a stream of byte chunks (for large objects).
    async fn download_stream(&self, storage_key: &str) -> StorageResult<ByteStream>;

    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Size in bytes of an object, if it exists.
    async fn content_length(&self, storage_key: &str) -> StorageResult<u64>;

    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Delete every object under a key prefix (an asset's whole footprint).
    async fn delete_prefix(&self, prefix: &str) -> StorageResult<()>;
}
