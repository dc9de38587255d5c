//! Error types for SQLite man page storage.

use thiserror::Error;

/// Errors that can occur during SQLite storage operations.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// Row-to-page conversion failure.
    #[error("conversion error: {0}")]
    ConversionError(String),

    /// Migration lifecycle operation failure.
    #[error("migration error: {0}")]
    MigrationError(String),

    /// Table prefix contains invalid characters.
    #[error("invalid prefix '{0}': must contain only alphanumeric characters and underscores")]
    InvalidPrefix(String),

    /// No stored page matches.
    #[error("man page not found: {0}")]
    ManPageNotFound(String),

    /// A page failed validation before insertion.
    #[error("invalid man page {page}: {reason}")]
    InvalidPage { page: String, reason: String },

    /// Error loading pages from files.
    #[error("loader error: {0}")]
    LoaderError(#[from] shell_explain_db::DatabaseError),
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;
