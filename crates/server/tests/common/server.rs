//! Server test utilities.

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response};
use scriptvault_core::UserRef;
use scriptvault_core::config::{AppConfig, MetadataConfig, StorageConfig};
use scriptvault_metadata::{MetadataStore, SqliteStore};
use scriptvault_server::{AppState, RepoFetcher, create_router};
use scriptvault_storage::{FilesystemBackend, ObjectStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage.
    pub async fn new() -> Self {
        Self::build(|_| {}, None).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        Self::build(modifier, None).await
    }

    /// Create a test server whose webhook hands work to `fetcher`.
    pub async fn with_fetcher(fetcher: Arc<dyn RepoFetcher>) -> Self {
        Self::build(|_| {}, Some(fetcher)).await
    }

    async fn build<F>(modifier: F, fetcher: Option<Arc<dyn RepoFetcher>>) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let storage_path = temp_dir.path().join("storage");
        let storage: Arc<dyn ObjectStore> = Arc::new(
            FilesystemBackend::new(&storage_path)
                .await
                .expect("Failed to create storage backend"),
        );

        let db_path = temp_dir.path().join("metadata.db");
        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(&db_path)
                .await
                .expect("Failed to create metadata store"),
        );

        let mut config = AppConfig {
            storage: StorageConfig::Filesystem { path: storage_path },
            metadata: MetadataConfig::Sqlite { path: db_path },
            ..Default::default()
        };
        config.ingest.blob_retry.initial_backoff_ms = 1;
        modifier(&mut config);

        scriptvault_server::metrics::register_metrics();
        let state = match fetcher {
            Some(fetcher) => AppState::with_fetcher(config, storage, metadata, fetcher),
            None => AppState::new(config, storage, metadata).expect("Failed to build state"),
        };
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying metadata.
    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }

    /// Get access to the underlying blob store.
    pub fn storage(&self) -> Arc<dyn ObjectStore> {
        self.state.storage.clone()
    }

    /// Create an author with an upload token.
    pub async fn create_user(&self, name: &str, github_username: Option<&str>) -> (UserRef, String) {
        crate::common::fixtures::create_user(self.state.metadata.as_ref(), name, github_username)
            .await
    }

    /// Send a request through the router as if it came from `peer`.
    pub async fn send_from(&self, peer: SocketAddr, mut request: Request<Body>) -> Response<Body> {
        request.extensions_mut().insert(ConnectInfo(peer));
        self.send(request).await
    }

    /// Send a request through the router.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }
}
