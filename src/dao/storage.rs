use std::error::Error;

use thiserror::Error;
use uuid::Uuid;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by record-store backends regardless of the underlying engine.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The referenced match row does not exist.
    #[error("match `{0}` not found")]
    MatchNotFound(Uuid),
    /// A join was attempted on a match that already holds two players.
    #[error("match `{0}` is full")]
    MatchFull(Uuid),
    /// The player already holds a row in this match.
    #[error("player `{uid}` already joined match `{match_id}`")]
    AlreadyJoined {
        /// Match the duplicate join targeted.
        match_id: Uuid,
        /// Identity that attempted to join twice.
        uid: String,
    },
    /// The backend could not be reached or failed mid-operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human-readable description of the failure.
        message: String,
        /// Underlying backend error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
