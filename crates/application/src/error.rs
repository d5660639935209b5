//! Application error types.

use common::AggregateId;
use domain::{BrandId, PartnershipError};
use storage::StorageError;
use thiserror::Error;

/// Errors that can occur while executing a command.
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// The target partnership is not stored.
    #[error("Partnership not found: {0}")]
    NotFound(AggregateId),

    /// A partnership with this ID already exists.
    #[error("Partnership already exists: {0}")]
    AlreadyExists(AggregateId),

    /// The brand may not enter partnerships.
    #[error("Brand not allowed: {0}")]
    BlockedBrand(BrandId),

    /// The input was rejected by the partnership aggregate.
    #[error("Domain error: {0}")]
    Domain(#[from] PartnershipError),

    /// Storage failed.
    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl ApplicationError {
    /// Returns true if retrying the same command can never succeed.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, ApplicationError::Storage(_))
    }
}

impl From<StorageError> for ApplicationError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Duplicate(id) => ApplicationError::AlreadyExists(id),
            other => ApplicationError::Storage(other),
        }
    }
}

/// Convenience type alias for application results.
pub type Result<T> = std::result::Result<T, ApplicationError>;
