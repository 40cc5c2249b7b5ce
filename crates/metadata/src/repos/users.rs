//! User repository.

use crate::error::MetadataResult;
use crate::models::UserRow;
use async_trait::async_trait;

/// Repository for author accounts.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Create a user. Fails with `AlreadyExists` on a duplicate name,
    /// repository username or token.
    async fn create_user(&self, user: &UserRow) -> MetadataResult<()>;

    /// Look up the author that owns a repository-host account.
    async fn get_user_by_github_username(
        &self,
        github_username: &str,
    ) -> MetadataResult<Option<UserRow>>;

    /// Look up the author holding an upload token (by SHA-256 hex).
    async fn get_user_by_token_hash(&self, token_hash: &str) -> MetadataResult<Option<UserRow>>;
}
