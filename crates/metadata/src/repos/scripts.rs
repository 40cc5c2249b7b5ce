//! Script repository.

use crate::error::MetadataResult;
use crate::models::{ScriptRow, ScriptWrite, UpsertedScript};
use async_trait::async_trait;

/// Repository for script records.
#[async_trait]
pub trait ScriptRepo: Send + Sync {
    /// Get a script by install name.
    async fn get_script(&self, install_name: &str) -> MetadataResult<Option<ScriptRow>>;

    /// Create the record, or replace name, metadata and content digest of
    /// the existing one.
    ///
    /// Runs as a single statement, so concurrent writers of the same install
    /// name cannot both create. Author, install count, rating and creation
    /// time of an existing record are left alone. Marks the blob unsynced.
    /// Returns `None`, writing nothing, when the install name belongs to a
    /// different author.
    async fn upsert_script(&self, write: &ScriptWrite) -> MetadataResult<Option<UpsertedScript>>;

    /// Replace name, metadata and content digest only if the writer's record
    /// exists.
    ///
    /// Returns `None` when there is no record or it belongs to a different
    /// author. Marks the blob unsynced.
    async fn update_script_if_exists(&self, write: &ScriptWrite)
    -> MetadataResult<Option<ScriptRow>>;

    /// Add one to the install counter. Returns false if the record is gone.
    async fn increment_installs(&self, install_name: &str) -> MetadataResult<bool>;

    /// Confirm the blob for the record version with digest `content_sha256`.
    ///
    /// Returns false, leaving the flag alone, when the record is gone or has
    /// since moved on to different content.
    async fn mark_blob_synced(&self, install_name: &str, content_sha256: &str)
    -> MetadataResult<bool>;

    /// Records whose blob write is unconfirmed, oldest update first.
    async fn list_unsynced_scripts(&self, limit: u32) -> MetadataResult<Vec<ScriptRow>>;
}
