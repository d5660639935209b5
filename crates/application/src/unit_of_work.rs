//! Unit of work: one storage transaction plus the events it causes.

use common::AggregateId;
use domain::Partnership;
use messaging::Broker;
use storage::{PartnershipStore, StorageOperation, StoreTransaction};

use crate::outbox::{FlushReport, Outbox, PendingEvent};
use crate::Result;

/// A position in a unit of work to roll back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Savepoint {
    operations: usize,
    events: usize,
}

/// Batches storage operations and events for a single command.
///
/// Nothing is written until [`UnitOfWork::commit`]; events are handed to the
/// outbox only if that commit succeeds. Dropping a unit of work without
/// committing discards everything and releases its row locks.
pub struct UnitOfWork<'a, T: StoreTransaction, B: Broker> {
    tx: T,
    outbox: &'a Outbox<B>,
    operations: Vec<StorageOperation>,
    events: Vec<PendingEvent>,
}

impl<'a, T: StoreTransaction, B: Broker> UnitOfWork<'a, T, B> {
    /// Opens a transaction on `store`.
    pub async fn begin<S>(store: &S, outbox: &'a Outbox<B>) -> Result<Self>
    where
        S: PartnershipStore<Tx = T>,
    {
        Ok(Self {
            tx: store.begin().await?,
            outbox,
            operations: Vec::new(),
            events: Vec::new(),
        })
    }

    /// Reads a partnership and locks it for the rest of this unit of work.
    pub async fn load_for_update(&mut self, id: AggregateId) -> Result<Option<Partnership>> {
        Ok(self.tx.load_for_update(id).await?)
    }

    /// Queues a storage operation.
    pub fn register(&mut self, operation: StorageOperation) {
        self.operations.push(operation);
    }

    /// Queues an event for publication after commit.
    pub fn register_event(&mut self, event: PendingEvent) {
        tracing::debug!(kind = %event.kind, "event registered");
        self.events.push(event);
    }

    pub fn operations(&self) -> &[StorageOperation] {
        &self.operations
    }

    pub fn events(&self) -> &[PendingEvent] {
        &self.events
    }

    /// Marks the current position.
    pub fn savepoint(&self) -> Savepoint {
        Savepoint {
            operations: self.operations.len(),
            events: self.events.len(),
        }
    }

    /// Forgets everything registered after `savepoint`.
    pub fn rollback_to(&mut self, savepoint: Savepoint) {
        self.operations.truncate(savepoint.operations);
        self.events.truncate(savepoint.events);
    }

    /// Executes the operations atomically, then publishes the events.
    pub async fn commit(self) -> Result<FlushReport> {
        self.outbox
            .commit(self.tx, self.operations, self.events)
            .await
    }

    /// Discards the registered operations and events.
    pub async fn rollback(self) -> Result<()> {
        if !self.events.is_empty() {
            tracing::debug!(discarded = self.events.len(), "events discarded");
        }
        Ok(self.tx.rollback().await?)
    }
}
