//! Database models mapping to the metadata schema.

use crate::error::{MetadataError, MetadataResult};
use scriptvault_core::{HeaderMap, UserRef};
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Scripts
// =============================================================================

/// Stored script record, keyed by install name.
#[derive(Debug, Clone, FromRow)]
pub struct ScriptRow {
    pub install_name: String,
    /// Display name, from the header's `@name`.
    pub name: String,
    pub about: String,
    pub installs: i64,
    pub rating: i64,
    pub installable: bool,
    /// Header mapping as a JSON array of `[key, value]` pairs.
    pub meta_json: String,
    pub author_id: Uuid,
    /// SHA-256 hex of the content this version of the record describes.
    pub content_sha256: String,
    /// False from the moment the record is written until the blob write for
    /// that version is confirmed.
    pub blob_synced: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ScriptRow {
    /// Decode the stored header mapping.
    pub fn meta(&self) -> MetadataResult<HeaderMap> {
        serde_json::from_str(&self.meta_json).map_err(|e| MetadataError::Corrupt {
            key: self.install_name.clone(),
            message: format!("meta_json: {e}"),
        })
    }
}

/// Values written by an ingestion. Everything else on the record is either
/// initialized on insert or preserved on update.
#[derive(Debug, Clone)]
pub struct ScriptWrite {
    pub install_name: String,
    pub name: String,
    pub meta_json: String,
    pub author_id: Uuid,
    pub content_sha256: String,
    pub written_at: OffsetDateTime,
}

impl ScriptWrite {
    pub fn new(
        install_name: impl Into<String>,
        name: impl Into<String>,
        meta: &HeaderMap,
        author_id: Uuid,
        content: &[u8],
    ) -> MetadataResult<Self> {
        let install_name = install_name.into();
        let meta_json = serde_json::to_string(meta).map_err(|e| MetadataError::Corrupt {
            key: install_name.clone(),
            message: format!("meta_json: {e}"),
        })?;
        Ok(Self {
            install_name,
            name: name.into(),
            meta_json,
            author_id,
            content_sha256: content_digest(content),
            written_at: OffsetDateTime::now_utc(),
        })
    }
}

/// SHA-256 of script content, lower-case hex.
pub fn content_digest(content: &[u8]) -> String {
    Sha256::digest(content)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Result of a create-or-update write.
#[derive(Debug, Clone)]
pub struct UpsertedScript {
    pub row: ScriptRow,
    pub created: bool,
}

// =============================================================================
// Users
// =============================================================================

/// Local author account.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub name: String,
    pub github_username: Option<String>,
    /// SHA-256 hex of the upload token, if the user can upload directly.
    pub token_hash: Option<String>,
    pub created_at: OffsetDateTime,
}

impl UserRow {
    pub fn to_user_ref(&self) -> UserRef {
        UserRef {
            id: self.user_id,
            name: self.name.clone(),
            github_username: self.github_username.clone(),
        }
    }
}
