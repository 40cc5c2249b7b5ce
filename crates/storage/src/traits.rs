//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Blob store for script content, keyed by install name.
///
/// Keys are `/`-separated relative paths such as `alice/tools/x.user.js`.
/// Writes replace any existing object under the same key; there is no
/// versioning.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Get an object's content.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Get an object as a byte stream.
    ///
    /// A missing object is reported when the stream is opened, not on first poll.
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream>;

    /// Put an object, overwriting any existing one. Readers never see a
    /// partially written object.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Backend identifier used in logs and metrics (e.g. "s3", "filesystem").
    fn backend_name(&self) -> &'static str;

    /// Verify the backend is reachable and configured. Called once at startup.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

