//! Blob store trait

use crate::domain::Result;
use async_trait::async_trait;
use std::path::Path;

/// Remote object storage used for CSV uploads and the state mirror
///
/// Keys are complete object keys; callers apply any prefix.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Uploads a local file under `key`
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Blob` if the file cannot be read or the upload fails.
    async fn upload_file(&self, key: &str, path: &Path) -> Result<()>;

    /// Uploads an in-memory buffer under `key`
    async fn upload_bytes(&self, key: &str, data: Vec<u8>) -> Result<()>;

    /// Fetches an object
    ///
    /// Returns `Ok(None)` when the object does not exist.
    async fn download_bytes(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Deletes an object
    async fn delete(&self, key: &str) -> Result<()>;

    /// Verifies write and delete access to the bucket
    async fn check_connection(&self) -> Result<()>;

    /// Display form of an object location, e.g. `s3://bucket/key`
    fn location(&self, key: &str) -> String;
}
