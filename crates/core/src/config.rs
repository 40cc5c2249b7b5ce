//! Configuration types shared across crates.

use ipnet::{IpNet, Ipv4Net};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

/// Bucket scripts have always been stored in.
pub const DEFAULT_BUCKET: &str = "OpenUserJS.org";

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Largest script accepted, from uploads and from repository fetches alike.
    #[serde(default = "default_max_script_bytes")]
    pub max_script_bytes: usize,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_script_bytes() -> usize {
    1024 * 1024
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_script_bytes: default_max_script_bytes(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_script_bytes == 0 {
            return Err("server.max_script_bytes must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket name (default: "OpenUserJS.org").
        #[serde(default = "default_bucket")]
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// AWS access key ID. Falls back to AWS_ACCESS_KEY_ID env var if not set.
        access_key_id: Option<String>,
        /// AWS secret access key. Falls back to AWS_SECRET_ACCESS_KEY env var if not set.
        secret_access_key: Option<String>,
        /// Force path-style URLs (`endpoint/bucket/key`). Required for MinIO.
        #[serde(default)]
        force_path_style: bool,
    },
}

fn default_bucket() -> String {
    DEFAULT_BUCKET.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/scripts"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                bucket,
                access_key_id,
                secret_access_key,
                ..
            } => {
                if bucket.is_empty() {
                    return Err("s3 config requires a non-empty bucket".to_string());
                }
                match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                    (Some(_), Some(_)) | (None, None) => Ok(()),
                    _ => Err(
                        "s3 config requires both access_key_id and secret_access_key when either is set"
                            .to_string(),
                    ),
                }
            }
            _ => Ok(()),
        }
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database.
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/metadata.db"),
        }
    }
}

/// Repository push webhook configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Mount `POST /hooks/github` (default: true).
    #[serde(default = "default_webhook_enabled")]
    pub enabled: bool,
    /// Peer addresses allowed to send push notifications.
    #[serde(default = "default_trusted_origins")]
    pub trusted_origins: Vec<IpNet>,
    /// Only pushes to this ref are processed.
    #[serde(default = "default_branch_ref")]
    pub branch_ref: String,
    /// Base URL for raw file downloads.
    #[serde(default = "default_raw_base_url")]
    pub raw_base_url: String,
}

fn default_webhook_enabled() -> bool {
    true
}

fn default_trusted_origins() -> Vec<IpNet> {
    Ipv4Net::new(Ipv4Addr::new(192, 30, 252, 0), 22)
        .map(IpNet::V4)
        .into_iter()
        .collect()
}

fn default_branch_ref() -> String {
    "refs/heads/master".to_string()
}

fn default_raw_base_url() -> String {
    "https://raw.github.com".to_string()
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: default_webhook_enabled(),
            trusted_origins: default_trusted_origins(),
            branch_ref: default_branch_ref(),
            raw_base_url: default_raw_base_url(),
        }
    }
}

impl WebhookConfig {
    /// Returns warnings for settings that are accepted but risky.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();
        if !self.enabled {
            return Ok(warnings);
        }

        if !self.raw_base_url.starts_with("http://") && !self.raw_base_url.starts_with("https://") {
            return Err(format!(
                "webhook.raw_base_url must be an http(s) URL, got {:?}",
                self.raw_base_url
            ));
        }
        if !self.branch_ref.starts_with("refs/") {
            return Err(format!(
                "webhook.branch_ref must be a full ref such as refs/heads/master, got {:?}",
                self.branch_ref
            ));
        }

        if self.trusted_origins.is_empty() {
            warnings.push(
                "webhook.trusted_origins is empty; every push notification will be dropped"
                    .to_string(),
            );
        }
        if self.trusted_origins.iter().any(|net| net.prefix_len() == 0) {
            warnings.push(
                "webhook.trusted_origins contains a /0 range; any peer can trigger repository fetches"
                    .to_string(),
            );
        }

        Ok(warnings)
    }
}

/// Retry policy for the blob write that follows a record write.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlobRetryConfig {
    /// Total attempts, including the first (default: 3).
    #[serde(default = "default_blob_attempts")]
    pub attempts: u32,
    /// Delay before the second attempt; doubled for each attempt after.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_blob_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    100
}

impl Default for BlobRetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_blob_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

impl BlobRetryConfig {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.attempts == 0 {
            return Err("ingest.blob_retry.attempts must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Ingestion configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub blob_retry: BlobRetryConfig,
}

/// Background reconciliation of records whose blob write failed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Seconds between sweeps. Disabled when unset.
    #[serde(default)]
    pub interval_secs: Option<u64>,
    /// Records examined per sweep.
    #[serde(default = "default_reconcile_batch_size")]
    pub batch_size: u32,
}

fn default_reconcile_batch_size() -> u32 {
    100
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval_secs: None,
            batch_size: default_reconcile_batch_size(),
        }
    }
}

impl ReconcileConfig {
    pub fn interval(&self) -> Option<Duration> {
        self.interval_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        // tokio::time::interval panics on a zero period
        if self.interval_secs == Some(0) {
            return Err("reconcile.interval_secs cannot be 0".to_string());
        }
        if self.batch_size == 0 {
            return Err("reconcile.batch_size must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

impl AppConfig {
    /// Validate every section, returning warnings for risky but allowed settings.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        self.server.validate()?;
        self.storage.validate()?;
        self.ingest.blob_retry.validate()?;
        self.reconcile.validate()?;
        self.webhook.validate()
    }
}
