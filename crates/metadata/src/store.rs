//! Metadata store trait and SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{ScriptRepo, UserRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: ScriptRepo + UserRepo + Send + Sync {
    /// Create tables and indexes if missing.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and migrate it.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        // One connection: SQLite serializes writers anyway, and a single
        // connection avoids "database is locked" under request concurrency.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        tracing::debug!(path = %path.display(), "opened sqlite metadata store");
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

mod sqlite_impl {
    use super::*;
    use crate::models::*;

    #[derive(sqlx::FromRow)]
    struct UpsertReturning {
        #[sqlx(flatten)]
        row: ScriptRow,
        created: bool,
    }

    #[async_trait]
    impl ScriptRepo for SqliteStore {
        async fn get_script(&self, install_name: &str) -> MetadataResult<Option<ScriptRow>> {
            let row = sqlx::query_as::<_, ScriptRow>("SELECT * FROM scripts WHERE install_name = ?")
                .bind(install_name)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn upsert_script(
            &self,
            write: &ScriptWrite,
        ) -> MetadataResult<Option<UpsertedScript>> {
            // created_at and updated_at are bound to the same instant on insert
            // and diverge on any later update, which is how `created` is told apart.
            // A conflicting row owned by someone else fails the WHERE and returns nothing.
            let returned = sqlx::query_as::<_, UpsertReturning>(
                r#"
                INSERT INTO scripts (
                    install_name, name, about, installs, rating, installable,
                    meta_json, author_id, content_sha256, blob_synced, created_at, updated_at
                ) VALUES (?, ?, '', 0, 0, 1, ?, ?, ?, 0, ?, ?)
                ON CONFLICT(install_name) DO UPDATE SET
                    name = excluded.name,
                    meta_json = excluded.meta_json,
                    content_sha256 = excluded.content_sha256,
                    blob_synced = 0,
                    updated_at = excluded.updated_at
                WHERE scripts.author_id = excluded.author_id
                RETURNING *, (created_at = updated_at) AS created
                "#,
            )
            .bind(&write.install_name)
            .bind(&write.name)
            .bind(&write.meta_json)
            .bind(write.author_id)
            .bind(&write.content_sha256)
            .bind(write.written_at)
            .bind(write.written_at)
            .fetch_optional(&self.pool)
            .await?;

            Ok(returned.map(|returned| UpsertedScript {
                row: returned.row,
                created: returned.created,
            }))
        }

        async fn update_script_if_exists(
            &self,
            write: &ScriptWrite,
        ) -> MetadataResult<Option<ScriptRow>> {
            let row = sqlx::query_as::<_, ScriptRow>(
                r#"
                UPDATE scripts
                SET name = ?, meta_json = ?, content_sha256 = ?, blob_synced = 0, updated_at = ?
                WHERE install_name = ? AND author_id = ?
                RETURNING *
                "#,
            )
            .bind(&write.name)
            .bind(&write.meta_json)
            .bind(&write.content_sha256)
            .bind(write.written_at)
            .bind(&write.install_name)
            .bind(write.author_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn increment_installs(&self, install_name: &str) -> MetadataResult<bool> {
            let result = sqlx::query("UPDATE scripts SET installs = installs + 1 WHERE install_name = ?")
                .bind(install_name)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        }

        async fn mark_blob_synced(
            &self,
            install_name: &str,
            content_sha256: &str,
        ) -> MetadataResult<bool> {
            let result = sqlx::query(
                "UPDATE scripts SET blob_synced = 1 WHERE install_name = ? AND content_sha256 = ?",
            )
            .bind(install_name)
            .bind(content_sha256)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        }

        async fn list_unsynced_scripts(&self, limit: u32) -> MetadataResult<Vec<ScriptRow>> {
            let rows = sqlx::query_as::<_, ScriptRow>(
                "SELECT * FROM scripts WHERE blob_synced = 0 ORDER BY updated_at ASC LIMIT ?",
            )
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl UserRepo for SqliteStore {
        async fn create_user(&self, user: &UserRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO users (user_id, name, github_username, token_hash, created_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(user.user_id)
            .bind(&user.name)
            .bind(&user.github_username)
            .bind(&user.token_hash)
            .bind(user.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    MetadataError::AlreadyExists(format!("user {}", user.name))
                } else {
                    MetadataError::Database(e)
                }
            })?;
            Ok(())
        }

        async fn get_user_by_github_username(
            &self,
            github_username: &str,
        ) -> MetadataResult<Option<UserRow>> {
            let row =
                sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE github_username = ?")
                    .bind(github_username)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(row)
        }

        async fn get_user_by_token_hash(&self, token_hash: &str) -> MetadataResult<Option<UserRow>> {
            let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE token_hash = ?")
                .bind(token_hash)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }
    }
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    user_id BLOB PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    github_username TEXT UNIQUE,
    token_hash TEXT UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS scripts (
    install_name TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    about TEXT NOT NULL DEFAULT '',
    installs INTEGER NOT NULL DEFAULT 0,
    rating INTEGER NOT NULL DEFAULT 0,
    installable INTEGER NOT NULL DEFAULT 1,
    meta_json TEXT NOT NULL,
    author_id BLOB NOT NULL REFERENCES users(user_id),
    content_sha256 TEXT NOT NULL DEFAULT '',
    blob_synced INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_scripts_author ON scripts(author_id);
CREATE INDEX IF NOT EXISTS idx_scripts_unsynced ON scripts(updated_at) WHERE blob_synced = 0;
"#;
