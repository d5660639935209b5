use async_trait::async_trait;
use common::AggregateId;
use domain::Partnership;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::{
    PartnershipRecord, Result, StorageError,
    store::{PartnershipStore, StorageOperation, StoreTransaction},
};

const SELECT_COLUMNS: &str = r#"
    SELECT id, brand_id, partner_id, partnership_type, state, level, terms,
           commission_rate, monthly_goal, benefits, notes,
           created_at, started_at, ended_at, last_activity_at
    FROM partnerships
    WHERE id = $1
"#;

/// PostgreSQL-backed partnership store.
#[derive(Clone)]
pub struct PostgresPartnershipStore {
    pool: PgPool,
}

impl PostgresPartnershipStore {
    /// Creates a new PostgreSQL partnership store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_record(row: PgRow) -> Result<PartnershipRecord> {
        Ok(PartnershipRecord {
            id: row.try_get("id")?,
            brand_id: row.try_get("brand_id")?,
            partner_id: row.try_get("partner_id")?,
            partnership_type: row.try_get("partnership_type")?,
            state: row.try_get("state")?,
            level: row.try_get("level")?,
            terms: row.try_get("terms")?,
            commission_rate: row.try_get("commission_rate")?,
            monthly_goal: row.try_get("monthly_goal")?,
            benefits: row.try_get("benefits")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
            started_at: row.try_get("started_at")?,
            ended_at: row.try_get("ended_at")?,
            last_activity_at: row.try_get("last_activity_at")?,
        })
    }
}

#[async_trait]
impl PartnershipStore for PostgresPartnershipStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTransaction { tx })
    }

    async fn get(&self, id: AggregateId) -> Result<Option<Partnership>> {
        let row = sqlx::query(SELECT_COLUMNS)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| Self::row_to_record(row)?.into_partnership())
            .transpose()
    }
}

/// Transaction over a [`PostgresPartnershipStore`].
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PostgresTransaction {
    async fn insert(&mut self, record: &PartnershipRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO partnerships (
                id, brand_id, partner_id, partnership_type, state, level, terms,
                commission_rate, monthly_goal, benefits, notes,
                created_at, started_at, ended_at, last_activity_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(record.id)
        .bind(record.brand_id)
        .bind(record.partner_id)
        .bind(&record.partnership_type)
        .bind(&record.state)
        .bind(&record.level)
        .bind(&record.terms)
        .bind(record.commission_rate)
        .bind(record.monthly_goal)
        .bind(&record.benefits)
        .bind(&record.notes)
        .bind(record.created_at)
        .bind(record.started_at)
        .bind(record.ended_at)
        .bind(record.last_activity_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StorageError::Duplicate(record.aggregate_id());
            }
            StorageError::Database(e)
        })?;

        Ok(())
    }

    async fn update(&mut self, record: &PartnershipRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE partnerships
            SET state = $2, level = $3, terms = $4, commission_rate = $5,
                monthly_goal = $6, benefits = $7, notes = $8,
                started_at = $9, ended_at = $10, last_activity_at = $11
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(&record.state)
        .bind(&record.level)
        .bind(&record.terms)
        .bind(record.commission_rate)
        .bind(record.monthly_goal)
        .bind(&record.benefits)
        .bind(&record.notes)
        .bind(record.started_at)
        .bind(record.ended_at)
        .bind(record.last_activity_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(record.aggregate_id()));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn load_for_update(&mut self, id: AggregateId) -> Result<Option<Partnership>> {
        let sql = format!("{SELECT_COLUMNS} FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(|row| PostgresPartnershipStore::row_to_record(row)?.into_partnership())
            .transpose()
    }

    async fn commit(mut self, operations: Vec<StorageOperation>) -> Result<()> {
        // Dropping the sqlx transaction on an early return rolls it back
        for op in &operations {
            match op {
                StorageOperation::Insert(record) => self.insert(record).await?,
                StorageOperation::Update(record) => self.update(record).await?,
            }
        }

        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
