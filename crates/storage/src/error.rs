use common::AggregateId;
use thiserror::Error;

/// Errors that can occur when reading or writing partnerships.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A partnership with this ID is already stored.
    #[error("Partnership already exists: {0}")]
    Duplicate(AggregateId),

    /// An update targeted a partnership that is not stored.
    #[error("Partnership not found: {0}")]
    NotFound(AggregateId),

    /// A stored row could not be mapped back onto the aggregate.
    #[error("Corrupt partnership row {id}: {reason}")]
    Corrupt { id: AggregateId, reason: String },

    /// The store refused to commit.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
