use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use common::AggregateId;
use domain::Partnership;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    PartnershipRecord, Result, StorageError,
    store::{PartnershipStore, StorageOperation, StoreTransaction},
};

/// In-memory partnership store.
///
/// Provides the same transactional behaviour as the PostgreSQL store: row
/// locks held for the life of a transaction and all-or-nothing commits.
/// Commit failures can be injected to exercise rollback paths.
#[derive(Clone, Default)]
pub struct InMemoryPartnershipStore {
    rows: Arc<RwLock<HashMap<AggregateId, PartnershipRecord>>>,
    locks: Arc<Mutex<HashMap<AggregateId, Arc<Mutex<()>>>>>,
    failing_commits: Arc<AtomicUsize>,
}

impl InMemoryPartnershipStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored partnerships.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Makes the next `count` commits fail without writing anything.
    pub fn fail_next_commits(&self, count: usize) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Clears all stored partnerships.
    pub async fn clear(&self) {
        self.rows.write().await.clear();
    }

    async fn row_lock(&self, id: AggregateId) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl PartnershipStore for InMemoryPartnershipStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        Ok(InMemoryTransaction {
            store: self.clone(),
            held: HashMap::new(),
        })
    }

    async fn get(&self, id: AggregateId) -> Result<Option<Partnership>> {
        let record = self.rows.read().await.get(&id).cloned();
        record.map(PartnershipRecord::into_partnership).transpose()
    }
}

/// Transaction over an [`InMemoryPartnershipStore`].
pub struct InMemoryTransaction {
    store: InMemoryPartnershipStore,
    held: HashMap<AggregateId, OwnedMutexGuard<()>>,
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn load_for_update(&mut self, id: AggregateId) -> Result<Option<Partnership>> {
        if !self.held.contains_key(&id) {
            let guard = self.store.row_lock(id).await.lock_owned().await;
            self.held.insert(id, guard);
        }

        self.store.get(id).await
    }

    async fn commit(self, operations: Vec<StorageOperation>) -> Result<()> {
        if self.store.take_injected_failure() {
            tracing::warn!(operations = operations.len(), "injected commit failure");
            return Err(StorageError::Unavailable(
                "injected commit failure".to_string(),
            ));
        }

        let mut rows = self.store.rows.write().await;

        // Validate the whole batch first so a bad operation writes nothing
        let mut inserted = Vec::new();
        for op in &operations {
            let id = op.aggregate_id();
            let exists = rows.contains_key(&id) || inserted.contains(&id);
            match op {
                StorageOperation::Insert(_) if exists => return Err(StorageError::Duplicate(id)),
                StorageOperation::Insert(_) => inserted.push(id),
                StorageOperation::Update(_) if !exists => return Err(StorageError::NotFound(id)),
                StorageOperation::Update(_) => {}
            }
        }

        for op in operations {
            match op {
                StorageOperation::Insert(record) | StorageOperation::Update(record) => {
                    rows.insert(record.aggregate_id(), record);
                }
            }
        }

        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        self.held.clear();

        // A lock nobody holds or waits for is referenced only by the map.
        // Under contention the next transaction to finish prunes it.
        if let Ok(mut locks) = self.store.locks.try_lock() {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use domain::{
        AggregateRoot, BrandId, NewPartnership, PartnerId, PartnershipState, PartnershipType,
    };

    fn partnership() -> Partnership {
        Partnership::create(NewPartnership {
            id: AggregateId::new(),
            brand_id: BrandId::new(),
            partner_id: PartnerId::new(),
            partnership_type: PartnershipType::BrandAffiliate,
            terms: String::new(),
            commission_rate: 0.0,
            monthly_goal: 0,
            benefits: String::new(),
            notes: String::new(),
        })
        .unwrap()
    }

    async fn stored(store: &InMemoryPartnershipStore) -> Partnership {
        let p = partnership();
        let tx = store.begin().await.unwrap();
        tx.commit(vec![StorageOperation::insert(&p)]).await.unwrap();
        p
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryPartnershipStore::new();
        let p = stored(&store).await;

        let loaded = store.get(p.id()).await.unwrap().unwrap();
        assert_eq!(loaded.snapshot(), p.snapshot());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = InMemoryPartnershipStore::new();
        assert!(store.get(AggregateId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_rejected() {
        let store = InMemoryPartnershipStore::new();
        let p = stored(&store).await;

        let tx = store.begin().await.unwrap();
        let result = tx.commit(vec![StorageOperation::insert(&p)]).await;

        assert!(matches!(result, Err(StorageError::Duplicate(id)) if id == p.id()));
    }

    #[tokio::test]
    async fn test_update_missing_is_rejected() {
        let store = InMemoryPartnershipStore::new();
        let p = partnership();

        let tx = store.begin().await.unwrap();
        let result = tx.commit(vec![StorageOperation::update(&p)]).await;

        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing() {
        let store = InMemoryPartnershipStore::new();
        let existing = stored(&store).await;
        let fresh = partnership();

        let tx = store.begin().await.unwrap();
        let result = tx
            .commit(vec![
                StorageOperation::insert(&fresh),
                StorageOperation::insert(&existing),
            ])
            .await;

        assert!(result.is_err());
        assert!(store.get(fresh.id()).await.unwrap().is_none());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_injected_failure_writes_nothing() {
        let store = InMemoryPartnershipStore::new();
        store.fail_next_commits(1);
        let p = partnership();

        let tx = store.begin().await.unwrap();
        let result = tx.commit(vec![StorageOperation::insert(&p)]).await;
        assert!(matches!(result, Err(StorageError::Unavailable(_))));
        assert!(store.is_empty().await);

        // Only the requested number of commits fail
        let tx = store.begin().await.unwrap();
        tx.commit(vec![StorageOperation::insert(&p)]).await.unwrap();
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_persists_transition() {
        let store = InMemoryPartnershipStore::new();
        let p = stored(&store).await;

        let mut tx = store.begin().await.unwrap();
        let mut loaded = tx.load_for_update(p.id()).await.unwrap().unwrap();
        let _ = loaded.start_negotiation("terms");
        tx.commit(vec![StorageOperation::update(&loaded)])
            .await
            .unwrap();

        let reloaded = store.get(p.id()).await.unwrap().unwrap();
        assert_eq!(reloaded.state(), PartnershipState::Negotiating);
    }

    #[tokio::test]
    async fn test_row_lock_blocks_second_transaction_until_release() {
        let store = InMemoryPartnershipStore::new();
        let p = stored(&store).await;

        let mut first = store.begin().await.unwrap();
        first.load_for_update(p.id()).await.unwrap();

        let second_store = store.clone();
        let id = p.id();
        let waiter = tokio::spawn(async move {
            let mut second = second_store.begin().await.unwrap();
            second.load_for_update(id).await.unwrap();
            second.rollback().await.unwrap();
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        first.rollback().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_reloading_same_row_in_one_transaction_does_not_deadlock() {
        let store = InMemoryPartnershipStore::new();
        let p = stored(&store).await;

        let mut tx = store.begin().await.unwrap();
        tx.load_for_update(p.id()).await.unwrap();
        let again = tokio::time::timeout(Duration::from_secs(1), tx.load_for_update(p.id())).await;

        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn test_row_locks_are_released_with_the_transaction() {
        let store = InMemoryPartnershipStore::new();
        let p = stored(&store).await;

        for _ in 0..100 {
            let mut tx = store.begin().await.unwrap();
            assert!(tx.load_for_update(AggregateId::new()).await.unwrap().is_none());
            tx.rollback().await.unwrap();
        }
        let mut tx = store.begin().await.unwrap();
        tx.load_for_update(p.id()).await.unwrap();
        assert_eq!(store.locks.lock().await.len(), 1);

        tx.commit(vec![]).await.unwrap();
        assert!(store.locks.lock().await.is_empty());
    }
}
