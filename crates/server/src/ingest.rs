//! Script ingestion.
//!
//! A stored script lives in two places: the record in the metadata store and
//! the body in the blob store, both keyed by install name. There is no shared
//! transaction between them, so the record is written first and is the
//! authority. The blob write follows and is retried; if it still fails the
//! record stays marked `blob_synced = false` for the reconciliation sweep.

use crate::metrics::{BLOB_WRITE_FAILURES, record_rejection, record_stored};
use bytes::Bytes;
use scriptvault_core::config::BlobRetryConfig;
use scriptvault_core::{
    CanonicalizeError, FilenameSanitizer, HeaderMap, InstallName, UserRef, canonicalize,
    extract_header,
};
use scriptvault_metadata::models::{ScriptRow, ScriptWrite};
use scriptvault_metadata::{MetadataError, MetadataStore};
use scriptvault_storage::{ObjectStore, StorageError};
use std::sync::Arc;
use tracing::Instrument;

/// Chunk size used when scanning an in-memory upload for its header.
const HEADER_SCAN_CHUNK: usize = 8 * 1024;

/// Whether an ingestion may create a record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StoreMode {
    #[default]
    CreateOrUpdate,
    /// Replace an existing record; never create one.
    UpdateOnly,
}

/// Why an ingestion was turned away before anything was written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// `@name` is missing or sanitizes to nothing.
    NoName,
    /// Update-only ingestion of a script that was never stored.
    NotFound,
    /// The install name already belongs to a different author.
    NameTaken,
    /// The content has no `==UserScript==` block.
    MalformedHeader,
}

impl Rejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoName => "no_name",
            Self::NotFound => "not_found",
            Self::NameTaken => "name_taken",
            Self::MalformedHeader => "malformed_header",
        }
    }
}

/// A persisted script.
#[derive(Clone, Debug)]
pub struct StoredScript {
    pub install_name: InstallName,
    /// The record as written.
    pub row: ScriptRow,
    /// True when this ingestion created the record.
    pub created: bool,
    /// False when every blob write attempt failed. The record is still the
    /// stored version; the blob catches up on re-ingestion.
    pub blob_written: bool,
}

#[derive(Clone, Debug)]
pub enum StoreOutcome {
    Stored(StoredScript),
    Rejected(Rejection),
}

impl StoreOutcome {
    pub fn stored(&self) -> Option<&StoredScript> {
        match self {
            Self::Stored(script) => Some(script),
            Self::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Stored(_) => None,
            Self::Rejected(rejection) => Some(*rejection),
        }
    }
}

/// Store-layer failure while writing the record.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// The blob store refused the key outright. Retrying cannot help.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The ingestion coordinator.
pub struct Ingestor {
    metadata: Arc<dyn MetadataStore>,
    storage: Arc<dyn ObjectStore>,
    sanitizer: Arc<dyn FilenameSanitizer>,
    blob_retry: BlobRetryConfig,
}

impl Ingestor {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        storage: Arc<dyn ObjectStore>,
        sanitizer: Arc<dyn FilenameSanitizer>,
        blob_retry: BlobRetryConfig,
    ) -> Self {
        Self {
            metadata,
            storage,
            sanitizer,
            blob_retry,
        }
    }

    /// Store a script whose header has already been parsed.
    ///
    /// Re-storing the same (author, namespace, name) replaces the record's
    /// name and header and overwrites the blob. Author, install count and
    /// creation time are kept.
    pub async fn store_script(
        &self,
        user: &UserRef,
        meta: HeaderMap,
        content: Bytes,
        mode: StoreMode,
    ) -> Result<StoreOutcome, IngestError> {
        let script_name = meta.name().unwrap_or_default();
        let install_name =
            match canonicalize(self.sanitizer.as_ref(), &user.name, meta.namespace(), script_name) {
                Ok(name) => name,
                Err(CanonicalizeError::MissingName) => {
                    return Ok(reject(Rejection::NoName, &user.name));
                }
            };

        let span = tracing::info_span!("store_script", install_name = %install_name, user = %user.name);
        self.store_canonical(user, install_name, meta, content, mode)
            .instrument(span)
            .await
    }

    /// Extract the header from raw content and store it.
    ///
    /// Content without a header block is rejected with no I/O.
    pub async fn ingest_upload(
        &self,
        user: &UserRef,
        content: Bytes,
        mode: StoreMode,
    ) -> Result<StoreOutcome, IngestError> {
        let meta = extract_header(content.chunks(HEADER_SCAN_CHUNK));
        self.ingest_extracted(user, meta, content, mode).await
    }

    /// Store content whose header scan has already run.
    pub(crate) async fn ingest_extracted(
        &self,
        user: &UserRef,
        meta: Option<HeaderMap>,
        content: Bytes,
        mode: StoreMode,
    ) -> Result<StoreOutcome, IngestError> {
        match meta {
            Some(meta) => self.store_script(user, meta, content, mode).await,
            None => Ok(reject(Rejection::MalformedHeader, &user.name)),
        }
    }

    async fn store_canonical(
        &self,
        user: &UserRef,
        install_name: InstallName,
        meta: HeaderMap,
        content: Bytes,
        mode: StoreMode,
    ) -> Result<StoreOutcome, IngestError> {
        let display_name = meta.name().unwrap_or_default().trim().to_string();
        let write = ScriptWrite::new(install_name.as_str(), display_name, &meta, user.id, &content)?;

        let (row, created) = match mode {
            StoreMode::CreateOrUpdate => match self.metadata.upsert_script(&write).await? {
                Some(upserted) => (upserted.row, upserted.created),
                None => return Ok(reject(Rejection::NameTaken, &user.name)),
            },
            StoreMode::UpdateOnly => match self.metadata.update_script_if_exists(&write).await? {
                Some(row) => (row, false),
                None => return Ok(reject(Rejection::NotFound, &user.name)),
            },
        };
        record_stored(created);

        let blob_written = self.write_blob(&install_name, content).await?;
        if blob_written {
            match self
                .metadata
                .mark_blob_synced(install_name.as_str(), &write.content_sha256)
                .await
            {
                Ok(true) => {}
                // A newer version was recorded meanwhile; its own write confirms it.
                Ok(false) => tracing::debug!("record moved on before blob was confirmed"),
                // The blob is in place; the sweep will flip the flag later.
                Err(e) => tracing::warn!(error = %e, "failed to mark blob synced"),
            }
        }

        tracing::info!(created, blob_written, "script stored");
        Ok(StoreOutcome::Stored(StoredScript {
            install_name,
            row,
            created,
            blob_written,
        }))
    }

    /// Write the blob, retrying with exponential backoff.
    ///
    /// Returns `Ok(false)` when all attempts failed.
    async fn write_blob(&self, install_name: &InstallName, content: Bytes) -> Result<bool, IngestError> {
        let attempts = self.blob_retry.attempts.max(1);
        let backend = self.storage.backend_name();

        for attempt in 1..=attempts {
            match self.storage.put(install_name.as_str(), content.clone()).await {
                Ok(()) => return Ok(true),
                Err(e @ StorageError::InvalidKey(_)) => return Err(e.into()),
                Err(e) if attempt < attempts => {
                    let delay = self.blob_retry.backoff(attempt);
                    tracing::debug!(
                        backend,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "blob write failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    BLOB_WRITE_FAILURES.inc();
                    tracing::warn!(
                        backend,
                        attempts,
                        error = %e,
                        "blob write failed; record left unsynced"
                    );
                }
            }
        }
        Ok(false)
    }
}

fn reject(rejection: Rejection, user: &str) -> StoreOutcome {
    record_rejection(rejection.as_str());
    tracing::debug!(user, reason = rejection.as_str(), "ingestion rejected");
    StoreOutcome::Rejected(rejection)
}
