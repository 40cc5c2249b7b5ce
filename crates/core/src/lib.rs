//! Core domain types and shared logic for scriptvault.
//!
//! This crate defines the pieces of the ingestion pipeline that need no I/O:
//! - Incremental userscript header extraction and parsing
//! - Install name canonicalization and filename sanitization
//! - Push-notification evaluation for repository webhooks
//! - Configuration shared by the storage, metadata and server crates

pub mod config;
pub mod error;
pub mod header;
pub mod install_name;
pub mod notification;
pub mod sanitize;
pub mod user;

pub use error::{CanonicalizeError, Error, Result};
pub use header::{
    EmitOrder, HeaderExtractor, HeaderMap, extract_header, extract_header_from_stream,
    parse_header,
};
pub use install_name::{InstallName, META_SUFFIX, SCRIPT_SUFFIX, canonicalize};
pub use notification::{
    PendingPush, PushDecision, PushNotification, PushRejection, WebhookPolicy, evaluate_push,
};
pub use sanitize::{FilenameSanitizer, WebSafeSanitizer};
pub use user::UserRef;

/// Media type used for both script bodies and synthesized meta documents.
pub const SCRIPT_CONTENT_TYPE: &str = "text/javascript; charset=utf-8";

/// Accept header value that asks for the metadata-only document.
pub const META_ACCEPT: &str = "text/x-userscript-meta";
