//! Error types for core operations.

use thiserror::Error;
use validator::ValidationErrors;

use crate::state::machine::{InvalidTransition, StartBlocked};
use crate::store::error::StoreError;

/// Errors that can occur in service layer operations.
///
/// All of these are non-fatal: the attempted operation is dropped, the
/// shared state is untouched (or at worst partially written and reconciled
/// by the next pushed snapshot), and the user may retry.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend failed; not retried here, the store's own retry
    /// policy and the next snapshot reconcile it.
    #[error("store unavailable")]
    Unavailable(#[source] StoreError),
    /// The caller does not hold the role the operation requires.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the user; surfaced, nothing written.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation does not apply to the current room state; silent no-op
    /// upstream, never auto-retried.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Room or player vanished from the store.
    #[error("not found: {0}")]
    NotFound(String),
}

impl ServiceError {
    /// Canonical error for a room document that no longer exists.
    pub fn room_vanished(code: &str) -> Self {
        ServiceError::NotFound(format!("room `{code}` no longer exists"))
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::InvalidInput(format!("validation failed: {err}"))
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

impl From<StartBlocked> for ServiceError {
    fn from(err: StartBlocked) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}
