use async_trait::async_trait;
use common::AggregateId;
use domain::Partnership;

use crate::{PartnershipRecord, Result};

/// A write registered with a unit of work, executed at commit.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageOperation {
    /// Store a partnership that must not exist yet.
    Insert(PartnershipRecord),

    /// Overwrite a stored partnership.
    Update(PartnershipRecord),
}

impl StorageOperation {
    /// Creates an insert of the aggregate's current state.
    pub fn insert(partnership: &Partnership) -> Self {
        StorageOperation::Insert(PartnershipRecord::from_partnership(partnership))
    }

    /// Creates an update to the aggregate's current state.
    pub fn update(partnership: &Partnership) -> Self {
        StorageOperation::Update(PartnershipRecord::from_partnership(partnership))
    }

    /// Returns the partnership this operation writes.
    pub fn aggregate_id(&self) -> AggregateId {
        match self {
            StorageOperation::Insert(r) | StorageOperation::Update(r) => r.aggregate_id(),
        }
    }
}

/// Core trait for partnership storage.
///
/// Writes only happen through a [`StoreTransaction`], so every change is
/// all-or-nothing. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait PartnershipStore: Send + Sync {
    /// The transaction type handed out by [`PartnershipStore::begin`].
    type Tx: StoreTransaction;

    /// Opens a transaction.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Reads a partnership outside any transaction.
    ///
    /// Returns None if the partnership doesn't exist.
    async fn get(&self, id: AggregateId) -> Result<Option<Partnership>>;
}

/// An open storage transaction.
///
/// Rows read with [`StoreTransaction::load_for_update`] stay locked until
/// the transaction commits or rolls back, so concurrent commands on the same
/// partnership run one after the other.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Reads a partnership and locks its row.
    ///
    /// Returns None if the partnership doesn't exist.
    async fn load_for_update(&mut self, id: AggregateId) -> Result<Option<Partnership>>;

    /// Executes the operations in order and makes them durable.
    ///
    /// Either every operation is applied or none is.
    async fn commit(self, operations: Vec<StorageOperation>) -> Result<()>;

    /// Discards the transaction and releases its locks.
    async fn rollback(self) -> Result<()>;
}
