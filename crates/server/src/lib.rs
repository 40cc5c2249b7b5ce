//! HTTP server for scriptvault.
//!
//! This crate provides:
//! - The ingestion coordinator and the script upload endpoint
//! - Script and metadata delivery
//! - The repository push webhook and the HTTP repository fetcher
//! - The blob reconciliation sweep

pub mod auth;
pub mod delivery;
pub mod error;
pub mod fetch;
pub mod handlers;
pub mod ingest;
pub mod metrics;
pub mod reconcile;
pub mod routes;
pub mod state;
pub mod webhook;

pub use auth::{AuthenticatedUser, TraceId};
pub use delivery::{Delivery, DeliveryError, DeliveryOutcome};
pub use error::ApiError;
pub use fetch::{FetchSummary, HttpRepoFetcher, RepoFetcher};
pub use ingest::{IngestError, Ingestor, Rejection, StoreMode, StoreOutcome, StoredScript};
pub use reconcile::{ReconcileStats, reconcile_blobs};
pub use routes::create_router;
pub use state::AppState;
pub use webhook::{PushOutcome, WebhookHandler, resolve_owner};
