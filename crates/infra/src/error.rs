use thiserror::Error;

use hourbridge_auth::{AuthError, LookupError};
use hourbridge_core::DomainError;

/// Infrastructure failure reported by a store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend unreachable, or a lock was poisoned.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Compare-and-swap lost: the stored version moved on.
    #[error("version conflict: {0}")]
    VersionConflict(String),

    /// Uniqueness violation (e.g. a second live partnership for a pair).
    #[error("duplicate: {0}")]
    Duplicate(String),
}

impl StoreError {
    pub fn poisoned(what: &str) -> Self {
        StoreError::Unavailable(format!("{what} lock poisoned"))
    }
}

impl From<StoreError> for LookupError {
    fn from(value: StoreError) -> Self {
        LookupError::Unavailable(value.to_string())
    }
}

/// Error returned by engine operations.
///
/// Domain outcomes (validation, conflict, concurrency, unauthorized) and
/// infrastructure faults stay distinguishable so callers can map them to
/// different responses.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FederationError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for FederationError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::VersionConflict(msg) => {
                FederationError::Domain(DomainError::concurrency(msg))
            }
            StoreError::Duplicate(msg) => FederationError::Domain(DomainError::conflict(msg)),
            other => FederationError::Store(other),
        }
    }
}

pub type FederationResult<T> = Result<T, FederationError>;
