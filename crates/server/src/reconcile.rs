//! Blob reconciliation sweep.
//!
//! Records are written before their blobs. When the blob write fails for
//! good the record keeps `blob_synced = false`; this sweep revisits those
//! records and clears the flag for any whose stored blob hashes to the
//! record's content digest. A blob left over from an earlier version does not
//! count. Content that never arrived cannot be recreated here, so those
//! records stay pending until the author stores the script again.

use scriptvault_core::config::ReconcileConfig;
use scriptvault_metadata::models::content_digest;
use scriptvault_metadata::{MetadataResult, MetadataStore};
use scriptvault_storage::ObjectStore;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub checked: usize,
    pub repaired: usize,
    /// No blob, or it could not be read.
    pub still_missing: usize,
    /// A blob exists but holds other content than the record describes.
    pub stale: usize,
}

/// Run one pass over at most `batch` unsynced records, oldest first.
pub async fn reconcile_blobs(
    metadata: &dyn MetadataStore,
    storage: &dyn ObjectStore,
    batch: u32,
) -> MetadataResult<ReconcileStats> {
    let mut stats = ReconcileStats::default();

    for row in metadata.list_unsynced_scripts(batch).await? {
        stats.checked += 1;
        match storage.get(&row.install_name).await {
            Ok(blob) if content_digest(&blob) == row.content_sha256 => {
                if metadata
                    .mark_blob_synced(&row.install_name, &row.content_sha256)
                    .await?
                {
                    stats.repaired += 1;
                }
            }
            Ok(_) => {
                stats.stale += 1;
                tracing::warn!(install_name = %row.install_name, "script blob does not match record");
            }
            Err(e) if e.is_not_found() => {
                stats.still_missing += 1;
                tracing::warn!(install_name = %row.install_name, "script blob still missing");
            }
            Err(e) => {
                stats.still_missing += 1;
                tracing::warn!(install_name = %row.install_name, error = %e, "blob read failed");
            }
        }
    }

    Ok(stats)
}

/// Spawn the periodic sweep if an interval is configured.
pub fn spawn_reconciler(
    metadata: Arc<dyn MetadataStore>,
    storage: Arc<dyn ObjectStore>,
    config: &ReconcileConfig,
) -> Option<JoinHandle<()>> {
    let period = config.interval()?;
    let batch = config.batch_size;

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so startup is quiet.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match reconcile_blobs(metadata.as_ref(), storage.as_ref(), batch).await {
                Ok(stats) if stats.checked > 0 => {
                    tracing::info!(
                        checked = stats.checked,
                        repaired = stats.repaired,
                        still_missing = stats.still_missing,
                        stale = stats.stale,
                        "blob reconciliation pass finished"
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "blob reconciliation pass failed"),
            }
        }
    }))
}
