//! Storage test utilities.

use async_trait::async_trait;
use bytes::Bytes;
use scriptvault_storage::{ByteStream, FilesystemBackend, ObjectStore, StorageError, StorageResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// A test storage wrapper that cleans up on drop.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestStorage {
    pub backend: Arc<dyn ObjectStore>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestStorage {
    /// Create a new test storage with a temporary directory.
    pub async fn new() -> StorageResult<Self> {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let backend = FilesystemBackend::new(temp_dir.path()).await?;

        Ok(Self {
            backend: Arc::new(backend),
            _temp_dir: temp_dir,
        })
    }

    /// Get a reference to the object store.
    pub fn store(&self) -> Arc<dyn ObjectStore> {
        self.backend.clone()
    }
}

/// Object store whose first `fail_puts` writes fail with an I/O error.
/// Everything else is delegated to the inner store.
#[allow(dead_code)]
pub struct FlakyStorage {
    inner: Arc<dyn ObjectStore>,
    fail_puts: usize,
    put_calls: AtomicUsize,
}

#[allow(dead_code)]
impl FlakyStorage {
    pub fn new(inner: Arc<dyn ObjectStore>, fail_puts: usize) -> Self {
        Self {
            inner,
            fail_puts,
            put_calls: AtomicUsize::new(0),
        }
    }

    /// A store whose writes never succeed.
    pub fn always_failing(inner: Arc<dyn ObjectStore>) -> Self {
        Self::new(inner, usize::MAX)
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for FlakyStorage {
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }

    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        self.inner.get_stream(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let call = self.put_calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_puts {
            return Err(StorageError::Io(std::io::Error::other("injected put failure")));
        }
        self.inner.put(key, data).await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}
