//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p storage --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;
use std::time::Duration;

use common::AggregateId;
use domain::{
    AggregateRoot, BrandId, NewPartnership, PartnerId, Partnership, PartnershipLevel,
    PartnershipState, PartnershipType,
};
use serial_test::serial;
use sqlx::PgPool;
use storage::{
    PartnershipStore, PostgresPartnershipStore, StorageError, StorageOperation, StoreTransaction,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_partnerships_table.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresPartnershipStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE partnerships")
        .execute(&pool)
        .await
        .unwrap();

    PostgresPartnershipStore::new(pool)
}

fn new_partnership() -> Partnership {
    Partnership::create(NewPartnership {
        id: AggregateId::new(),
        brand_id: BrandId::new(),
        partner_id: PartnerId::new(),
        partnership_type: PartnershipType::BrandInfluencer,
        terms: "initial".to_string(),
        commission_rate: 1.5,
        monthly_goal: 5,
        benefits: "swag".to_string(),
        notes: String::new(),
    })
    .unwrap()
}

async fn insert(store: &PostgresPartnershipStore, p: &Partnership) {
    let tx = store.begin().await.unwrap();
    tx.commit(vec![StorageOperation::insert(p)]).await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_insert_and_get_round_trip() {
    let store = get_test_store().await;
    let p = new_partnership();
    insert(&store, &p).await;

    let loaded = store.get(p.id()).await.unwrap().unwrap();

    assert_eq!(loaded.id(), p.id());
    assert_eq!(loaded.state(), PartnershipState::Initiating);
    assert_eq!(loaded.partnership_type(), PartnershipType::BrandInfluencer);
    assert_eq!(loaded.terms(), "initial");
    assert_eq!(loaded.monthly_goal(), 5);
    assert!(loaded.ended_at().is_none());
}

#[tokio::test]
#[serial]
async fn test_get_missing_returns_none() {
    let store = get_test_store().await;
    assert!(store.get(AggregateId::new()).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn test_duplicate_insert_maps_to_duplicate() {
    let store = get_test_store().await;
    let p = new_partnership();
    insert(&store, &p).await;

    let tx = store.begin().await.unwrap();
    let result = tx.commit(vec![StorageOperation::insert(&p)]).await;

    assert!(matches!(result, Err(StorageError::Duplicate(id)) if id == p.id()));
}

#[tokio::test]
#[serial]
async fn test_update_through_locked_load() {
    let store = get_test_store().await;
    let p = new_partnership();
    insert(&store, &p).await;

    let mut tx = store.begin().await.unwrap();
    let mut loaded = tx.load_for_update(p.id()).await.unwrap().unwrap();
    let _ = loaded.start_negotiation("negotiated");
    let _ = loaded.activate(2.0, 40).unwrap();
    let _ = loaded.update_level(PartnershipLevel::Silver);
    tx.commit(vec![StorageOperation::update(&loaded)])
        .await
        .unwrap();

    let reloaded = store.get(p.id()).await.unwrap().unwrap();
    assert_eq!(reloaded.state(), PartnershipState::Active);
    assert_eq!(reloaded.level(), PartnershipLevel::Silver);
    assert_eq!(reloaded.terms(), "negotiated");
    assert_eq!(reloaded.commission_rate(), 2.0);
}

#[tokio::test]
#[serial]
async fn test_failed_batch_leaves_nothing_behind() {
    let store = get_test_store().await;
    let existing = new_partnership();
    insert(&store, &existing).await;
    let fresh = new_partnership();

    let tx = store.begin().await.unwrap();
    let result = tx
        .commit(vec![
            StorageOperation::insert(&fresh),
            StorageOperation::insert(&existing),
        ])
        .await;

    assert!(result.is_err());
    assert!(store.get(fresh.id()).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn test_rollback_discards_locked_changes() {
    let store = get_test_store().await;
    let p = new_partnership();
    insert(&store, &p).await;

    let mut tx = store.begin().await.unwrap();
    let _ = tx.load_for_update(p.id()).await.unwrap();
    tx.rollback().await.unwrap();

    let reloaded = store.get(p.id()).await.unwrap().unwrap();
    assert_eq!(reloaded.state(), PartnershipState::Initiating);
}

#[tokio::test]
#[serial]
async fn test_row_lock_serializes_transactions() {
    let store = get_test_store().await;
    let p = new_partnership();
    insert(&store, &p).await;

    let mut first = store.begin().await.unwrap();
    let _ = first.load_for_update(p.id()).await.unwrap();

    let second_store = store.clone();
    let id = p.id();
    let waiter = tokio::spawn(async move {
        let mut second = second_store.begin().await.unwrap();
        let _ = second.load_for_update(id).await.unwrap();
        second.rollback().await.unwrap();
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!waiter.is_finished());

    first.rollback().await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .unwrap()
        .unwrap();
}
