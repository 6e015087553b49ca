//! Error type shared by every store backend.

use std::error::Error;
use thiserror::Error;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error raised by store backends regardless of the underlying transport.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or rejected the request.
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Human readable description of the failure.
        message: String,
        /// Underlying transport error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A targeted update referenced a document that does not exist.
    #[error("document `{path}` does not exist")]
    Missing {
        /// Store path of the missing document.
        path: String,
    },
}

impl StoreError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StoreError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a missing-document error for the given store path.
    pub fn missing(path: impl Into<String>) -> Self {
        StoreError::Missing { path: path.into() }
    }
}
