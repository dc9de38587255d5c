//! Error types for man page database operations.
//!
//! Provides a unified error type covering all failure modes: I/O,
//! serialization, page validation, and compression.

use thiserror::Error;

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// A page failed validation.
    #[error("invalid man page: {0}")]
    InvalidPage(String),

    /// All configured loader sources failed.
    #[error("no man page sources available")]
    NoSourcesAvailable,

    /// Gzip decompression failure.
    #[error("compression error: {0}")]
    CompressionError(String),
}

/// Convenience alias for results with [`DatabaseError`].
pub type Result<T> = std::result::Result<T, DatabaseError>;
