//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("canonicalization failed: {0}")]
    Canonicalize(#[from] CanonicalizeError),

    #[error("invalid install name: {0}")]
    InvalidInstallName(String),

    #[error("invalid push payload: {0}")]
    InvalidPayload(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Failure to derive an install name from user and header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CanonicalizeError {
    /// The script name was empty after sanitization.
    #[error("script has no usable @name")]
    MissingName,
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
