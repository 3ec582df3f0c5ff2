//! Unified error types for flipcast.
//!
//! Storage failures bubble up unchanged; codec and limit problems are
//! normalized here so callers only ever see one error type.

use tokio_rusqlite::rusqlite;

/// Unified error types for the flipcast message cache.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., an empty update or a bad cache limit).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A resource address the cache does not serve.
    #[error("INVALID_ADDRESS: {0}")]
    InvalidAddress(String),

    /// A stored row could not be turned back into a message.
    #[error("CODEC_ERROR: {0}")]
    Codec(String),

    /// A table or column name that is not a plain SQL identifier.
    #[error("INVALID_IDENTIFIER: {0}")]
    InvalidIdentifier(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Failure reported by a storage engine that is not SQLite backed.
    #[error("CACHE_ERROR: {0}")]
    Storage(String),

    /// Schema creation or upgrade failed.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),
}

impl Error {
    /// Whether this error came from the storage layer (I/O, corruption,
    /// constraint failures other than replace-on-conflict, closed handles).
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, Error::Database(_) | Error::Storage(_) | Error::MigrationFailed(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
