//! Prometheus metrics for the scriptvault server.
//!
//! # Security Note
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping.
//! Metrics carry no script names or user names, only aggregate counts. The
//! endpoint should still be network-restricted to the scraper.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{self, Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Ingestion metrics
pub static SCRIPTS_STORED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "scriptvault_scripts_stored_total",
            "Scripts stored, by whether the record was created or updated",
        ),
        &["result"],
    )
    .expect("metric creation failed")
});

pub static INGEST_REJECTIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "scriptvault_ingest_rejections_total",
            "Ingestions rejected before any write, by reason",
        ),
        &["reason"],
    )
    .expect("metric creation failed")
});

pub static BLOB_WRITE_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "scriptvault_blob_write_failures_total",
        "Blob writes that failed after all retries; the record is left unsynced",
    )
    .expect("metric creation failed")
});

// Delivery metrics
pub static INSTALLS_SERVED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "scriptvault_installs_served_total",
        "Script bodies served for installation",
    )
    .expect("metric creation failed")
});

// Webhook metrics
pub static PUSH_EVENTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "scriptvault_push_events_total",
            "Repository push notifications, by outcome",
        ),
        &["outcome"],
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Idempotent, so tests can build as many routers as they like.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(SCRIPTS_STORED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(INGEST_REJECTIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BLOB_WRITE_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(INSTALLS_SERVED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PUSH_EVENTS.clone()))
            .expect("metric registration failed");
    });
}

/// Handler for the /metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Count a store by outcome label ("created" or "updated").
pub fn record_stored(created: bool) {
    let result = if created { "created" } else { "updated" };
    SCRIPTS_STORED.with_label_values(&[result]).inc();
}

pub fn record_rejection(reason: &str) {
    INGEST_REJECTIONS.with_label_values(&[reason]).inc();
}

pub fn record_push(outcome: &str) {
    PUSH_EVENTS.with_label_values(&[outcome]).inc();
}
