//! Stock participant: reserves inventory for an order, releases the
//! reservation on compensation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::SagaId;
use domain::{Command, CommandType, Reply};
use sqlx::{PgPool, Row};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{ParticipantError, Result};
use crate::service::ParticipantService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockStatus {
    Reserved,
    Released,
}

#[derive(Debug, Clone)]
pub struct ReservationRecord {
    pub reservation_id: Uuid,
    pub saga_id: SagaId,
    pub status: StockStatus,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait StockStore: Send + Sync {
    async fn reserve(&self, saga_id: SagaId, product_id: &str, quantity: i64) -> Result<ReservationRecord>;
    async fn release(&self, saga_id: SagaId) -> Result<ReservationRecord>;
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryStockStore {
    records: Arc<RwLock<HashMap<SagaId, ReservationRecord>>>,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn reserve(&self, saga_id: SagaId, _product_id: &str, _quantity: i64) -> Result<ReservationRecord> {
        let mut records = self.records.write().await;
        let record = records.entry(saga_id).or_insert_with(|| ReservationRecord {
            reservation_id: Uuid::new_v4(),
            saga_id,
            status: StockStatus::Reserved,
            updated_at: Utc::now(),
        });
        record.status = StockStatus::Reserved;
        Ok(record.clone())
    }

    async fn release(&self, saga_id: SagaId) -> Result<ReservationRecord> {
        let mut records = self.records.write().await;
        let record = records.entry(saga_id).or_insert_with(|| ReservationRecord {
            reservation_id: Uuid::new_v4(),
            saga_id,
            status: StockStatus::Released,
            updated_at: Utc::now(),
        });
        record.status = StockStatus::Released;
        Ok(record.clone())
    }
}

#[derive(Debug, Clone)]
pub struct PostgresStockStore {
    pool: PgPool,
}

impl PostgresStockStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations/stock").run(&self.pool).await?;
        Ok(())
    }

    async fn upsert(
        &self,
        saga_id: SagaId,
        product_id: &str,
        quantity: i64,
        status_str: &str,
        status: StockStatus,
    ) -> Result<ReservationRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO stock_reservations (saga_id, reservation_id, product_id, quantity, status, updated_at)
            VALUES ($1, gen_random_uuid(), $2, $3, $4, now())
            ON CONFLICT (saga_id) DO UPDATE SET status = $4, updated_at = now()
            RETURNING saga_id, reservation_id, updated_at
            "#,
        )
        .bind(saga_id.as_uuid())
        .bind(product_id)
        .bind(quantity)
        .bind(status_str)
        .fetch_one(&self.pool)
        .await?;

        Ok(ReservationRecord {
            reservation_id: row.try_get("reservation_id")?,
            saga_id: SagaId::from_uuid(row.try_get("saga_id")?),
            status,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl StockStore for PostgresStockStore {
    async fn reserve(&self, saga_id: SagaId, product_id: &str, quantity: i64) -> Result<ReservationRecord> {
        self.upsert(saga_id, product_id, quantity, "RESERVED", StockStatus::Reserved)
            .await
    }

    async fn release(&self, saga_id: SagaId) -> Result<ReservationRecord> {
        self.upsert(saga_id, "", 0, "RELEASED", StockStatus::Released).await
    }
}

pub struct StockService<S> {
    store: S,
}

impl<S: StockStore> StockService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: StockStore> ParticipantService for StockService<S> {
    async fn handle(&self, command: Command) -> std::result::Result<Reply, ParticipantError> {
        let product_id = command
            .payload
            .get("product_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let quantity = command
            .payload
            .get("quantity")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);

        let result = match command.command_type {
            CommandType::ReserveStock => self.store.reserve(command.saga_id, &product_id, quantity).await,
            CommandType::ReleaseStock => self.store.release(command.saga_id).await,
            other => {
                return Ok(Reply::failure(
                    command.command_id,
                    command.saga_id,
                    format!("unknown command: {other}"),
                ))
            }
        };

        match result {
            Ok(record) => Ok(Reply::success(
                command.command_id,
                command.saga_id,
                "stock processed",
                HashMap::from([(
                    "reservation_id".to_string(),
                    serde_json::json!(record.reservation_id),
                )]),
            )),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reserve_is_idempotent_and_reuses_reservation_id() {
        let store = InMemoryStockStore::new();
        let saga_id = SagaId::new();

        let first = store.reserve(saga_id, "P-1", 2).await.unwrap();
        let second = store.reserve(saga_id, "P-1", 2).await.unwrap();

        assert_eq!(first.reservation_id, second.reservation_id);
        assert_eq!(second.status, StockStatus::Reserved);
    }

    #[tokio::test]
    async fn release_with_no_reservation_still_succeeds() {
        let store = InMemoryStockStore::new();
        let record = store.release(SagaId::new()).await.unwrap();
        assert_eq!(record.status, StockStatus::Released);
    }
}
