//! Serving stored scripts and their metadata documents.

use crate::metrics::INSTALLS_SERVED;
use scriptvault_core::{EmitOrder, InstallName};
use scriptvault_metadata::{MetadataError, MetadataStore};
use scriptvault_storage::{ByteStream, ObjectStore, StorageError};
use std::sync::Arc;

/// Result of a delivery lookup. `NotFound` carries no body; the caller falls
/// through to its own not-found handling.
#[derive(Debug)]
pub enum DeliveryOutcome<T> {
    Found(T),
    NotFound,
}

impl<T> DeliveryOutcome<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The delivery reader.
#[derive(Clone)]
pub struct Delivery {
    metadata: Arc<dyn MetadataStore>,
    storage: Arc<dyn ObjectStore>,
}

impl Delivery {
    pub fn new(metadata: Arc<dyn MetadataStore>, storage: Arc<dyn ObjectStore>) -> Self {
        Self { metadata, storage }
    }

    /// Open the script body and count an install.
    ///
    /// The install counter is bumped in a detached task after the blob has
    /// been opened. A failed increment is logged and otherwise ignored, so
    /// the counter is best-effort.
    #[tracing::instrument(skip(self), fields(install_name = %install_name))]
    pub async fn send_script(
        &self,
        install_name: &InstallName,
    ) -> Result<DeliveryOutcome<ByteStream>, DeliveryError> {
        if self.metadata.get_script(install_name.as_str()).await?.is_none() {
            return Ok(DeliveryOutcome::NotFound);
        }

        let stream = match self.storage.get_stream(install_name.as_str()).await {
            Ok(stream) => stream,
            Err(e) if e.is_not_found() => {
                tracing::warn!("script record has no blob");
                return Ok(DeliveryOutcome::NotFound);
            }
            Err(e) => return Err(e.into()),
        };

        INSTALLS_SERVED.inc();
        let metadata = self.metadata.clone();
        let key = install_name.to_string();
        tokio::spawn(async move {
            match metadata.increment_installs(&key).await {
                Ok(true) => {}
                Ok(false) => tracing::debug!(install_name = %key, "record vanished before install count"),
                Err(e) => tracing::warn!(install_name = %key, error = %e, "failed to count install"),
            }
        });

        Ok(DeliveryOutcome::Found(stream))
    }

    /// Re-synthesize the header block of a stored script.
    ///
    /// Accepts either the `.meta.js` name or the script's own install name.
    #[tracing::instrument(skip(self), fields(install_name = %install_name))]
    pub async fn send_meta(
        &self,
        install_name: &InstallName,
    ) -> Result<DeliveryOutcome<String>, DeliveryError> {
        let script = install_name
            .strip_meta_suffix()
            .unwrap_or_else(|| install_name.clone());

        let Some(row) = self.metadata.get_script(script.as_str()).await? else {
            return Ok(DeliveryOutcome::NotFound);
        };

        let meta = row.meta()?;
        Ok(DeliveryOutcome::Found(
            meta.to_header_block(EmitOrder::default()),
        ))
    }
}
