//! Repository fetch collaborator.
//!
//! Downloads the raw content of files named in a push notification and feeds
//! each through the ingestion coordinator.

use crate::ingest::{Ingestor, StoreMode, StoreOutcome};
use anyhow::{Context, bail};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use futures::stream;
use scriptvault_core::{HeaderExtractor, HeaderMap, UserRef};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Downloads running at once for one push.
const FETCH_CONCURRENCY: usize = 4;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-batch counts. Every job lands in exactly one bucket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub stored: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl FetchSummary {
    pub fn total(&self) -> usize {
        self.stored + self.rejected + self.failed
    }
}

/// Loads remote files and ingests them on behalf of `user`.
///
/// A failure on one file never aborts the rest of the batch.
#[async_trait]
pub trait RepoFetcher: Send + Sync {
    async fn fetch_and_ingest(
        &self,
        user: &UserRef,
        jobs: &BTreeMap<String, String>,
        mode: StoreMode,
    ) -> FetchSummary;
}

/// Fetcher over HTTP.
pub struct HttpRepoFetcher {
    client: reqwest::Client,
    ingestor: Arc<Ingestor>,
    max_bytes: usize,
}

impl HttpRepoFetcher {
    pub fn new(ingestor: Arc<Ingestor>, max_bytes: usize) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(concat!("scriptvault/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            ingestor,
            max_bytes,
        })
    }

    /// Download one file, scanning for the header as chunks arrive.
    async fn download(&self, url: &str) -> anyhow::Result<(Option<HeaderMap>, Bytes)> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("request failed")?
            .error_for_status()
            .context("unexpected status")?;

        if let Some(len) = response.content_length()
            && len > self.max_bytes as u64
        {
            bail!("content length {len} exceeds limit of {} bytes", self.max_bytes);
        }

        let mut body = response.bytes_stream();
        let mut extractor = HeaderExtractor::new();
        let mut meta = None;
        let mut content = BytesMut::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.context("download interrupted")?;
            if content.len() + chunk.len() > self.max_bytes {
                bail!("content exceeds limit of {} bytes", self.max_bytes);
            }
            if meta.is_none() {
                meta = extractor.push(&chunk);
            }
            content.extend_from_slice(&chunk);
        }

        Ok((meta, content.freeze()))
    }

    async fn fetch_one(
        &self,
        user: &UserRef,
        url: &str,
        mode: StoreMode,
    ) -> anyhow::Result<StoreOutcome> {
        let (meta, content) = self.download(url).await?;
        let outcome = self
            .ingestor
            .ingest_extracted(user, meta, content, mode)
            .await?;
        Ok(outcome)
    }
}

#[async_trait]
impl RepoFetcher for HttpRepoFetcher {
    async fn fetch_and_ingest(
        &self,
        user: &UserRef,
        jobs: &BTreeMap<String, String>,
        mode: StoreMode,
    ) -> FetchSummary {
        let mut downloads = Vec::with_capacity(jobs.len());
        for (filename, url) in jobs {
            let (filename, url) = (filename.clone(), url.clone());
            downloads.push(async move {
                let result = self.fetch_one(user, &url, mode).await;
                (filename, result)
            });
        }

        let results: Vec<(String, anyhow::Result<StoreOutcome>)> = stream::iter(downloads)
            .buffer_unordered(FETCH_CONCURRENCY)
            .collect()
            .await;

        let mut summary = FetchSummary::default();
        for (filename, result) in results {
            match result {
                Ok(StoreOutcome::Stored(script)) => {
                    summary.stored += 1;
                    tracing::debug!(file = %filename, install_name = %script.install_name, "fetched script stored");
                }
                Ok(StoreOutcome::Rejected(rejection)) => {
                    summary.rejected += 1;
                    tracing::debug!(file = %filename, reason = rejection.as_str(), "fetched script rejected");
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(file = %filename, user = %user.name, error = ?e, "fetch failed");
                }
            }
        }

        tracing::info!(
            user = %user.name,
            stored = summary.stored,
            rejected = summary.rejected,
            failed = summary.failed,
            "repository fetch finished"
        );
        summary
    }
}
