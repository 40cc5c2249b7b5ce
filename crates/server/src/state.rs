//! Application state shared across handlers.

use crate::delivery::Delivery;
use crate::fetch::{HttpRepoFetcher, RepoFetcher};
use crate::ingest::Ingestor;
use crate::webhook::WebhookHandler;
use scriptvault_core::config::AppConfig;
use scriptvault_core::{FilenameSanitizer, WebSafeSanitizer, WebhookPolicy};
use scriptvault_metadata::MetadataStore;
use scriptvault_storage::ObjectStore;
use std::sync::Arc;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Blob store for script bodies.
    pub storage: Arc<dyn ObjectStore>,
    /// Script and author records.
    pub metadata: Arc<dyn MetadataStore>,
    pub ingestor: Arc<Ingestor>,
    pub delivery: Delivery,
    pub webhook: WebhookHandler,
}

impl AppState {
    /// Create application state with the HTTP repository fetcher.
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
    ) -> reqwest::Result<Self> {
        let ingestor = Arc::new(build_ingestor(&config, &storage, &metadata));
        let fetcher = Arc::new(HttpRepoFetcher::new(
            ingestor.clone(),
            config.server.max_script_bytes,
        )?);
        Ok(Self::assemble(config, storage, metadata, ingestor, fetcher))
    }

    /// Create application state with a caller-supplied repository fetcher.
    pub fn with_fetcher(
        config: AppConfig,
        storage: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        fetcher: Arc<dyn RepoFetcher>,
    ) -> Self {
        let ingestor = Arc::new(build_ingestor(&config, &storage, &metadata));
        Self::assemble(config, storage, metadata, ingestor, fetcher)
    }

    fn assemble(
        config: AppConfig,
        storage: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        ingestor: Arc<Ingestor>,
        fetcher: Arc<dyn RepoFetcher>,
    ) -> Self {
        let delivery = Delivery::new(metadata.clone(), storage.clone());
        let webhook = WebhookHandler::new(
            WebhookPolicy::from_config(&config.webhook),
            metadata.clone(),
            fetcher,
        );
        Self {
            config: Arc::new(config),
            storage,
            metadata,
            ingestor,
            delivery,
            webhook,
        }
    }
}

fn build_ingestor(
    config: &AppConfig,
    storage: &Arc<dyn ObjectStore>,
    metadata: &Arc<dyn MetadataStore>,
) -> Ingestor {
    let sanitizer: Arc<dyn FilenameSanitizer> = Arc::new(WebSafeSanitizer);
    Ingestor::new(
        metadata.clone(),
        storage.clone(),
        sanitizer,
        config.ingest.blob_retry.clone(),
    )
}
