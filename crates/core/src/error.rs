//! Unified error types for fairweather.
//!
//! Every variant here is absorbed somewhere inside the layer: the store
//! façade turns read failures into misses, and the arbitrator turns network
//! failures into cached or synthesized responses.

use tokio_rusqlite::rusqlite;

/// Unified error types for the offline caching layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., a zero TTL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A storage backend could not be initialized or has gone away.
    #[error("BACKEND_UNAVAILABLE: {0}")]
    BackendUnavailable(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A value could not be encoded or decoded as JSON.
    #[error("SERIALIZATION: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether this error means the durable backend is gone for good.
    ///
    /// A closed connection cannot recover within the session, so the store
    /// façade demotes itself to the flat backend when it sees one.
    pub fn is_fatal_backend(&self) -> bool {
        matches!(
            self,
            Error::Database(tokio_rusqlite::Error::ConnectionClosed | tokio_rusqlite::Error::Close(_))
        )
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

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
