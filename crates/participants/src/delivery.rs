//! Delivery participant: schedules a delivery for the order, cancels
//! the scheduled delivery on compensation.

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
pub enum DeliveryStatus {
    Scheduled,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct DeliveryRecord {
    pub tracking_id: Uuid,
    pub saga_id: SagaId,
    pub status: DeliveryStatus,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait DeliveryStore: Send + Sync {
    async fn schedule(&self, saga_id: SagaId, address: &str) -> Result<DeliveryRecord>;
    async fn cancel(&self, saga_id: SagaId) -> Result<DeliveryRecord>;
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryDeliveryStore {
    records: Arc<RwLock<HashMap<SagaId, DeliveryRecord>>>,
}

impl InMemoryDeliveryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeliveryStore for InMemoryDeliveryStore {
    async fn schedule(&self, saga_id: SagaId, _address: &str) -> Result<DeliveryRecord> {
        let mut records = self.records.write().await;
        let record = records.entry(saga_id).or_insert_with(|| DeliveryRecord {
            tracking_id: Uuid::new_v4(),
            saga_id,
            status: DeliveryStatus::Scheduled,
            updated_at: Utc::now(),
        });
        record.status = DeliveryStatus::Scheduled;
        Ok(record.clone())
    }

    async fn cancel(&self, saga_id: SagaId) -> Result<DeliveryRecord> {
        let mut records = self.records.write().await;
        let record = records.entry(saga_id).or_insert_with(|| DeliveryRecord {
            tracking_id: Uuid::new_v4(),
            saga_id,
            status: DeliveryStatus::Cancelled,
            updated_at: Utc::now(),
        });
        record.status = DeliveryStatus::Cancelled;
        Ok(record.clone())
    }
}

#[derive(Debug, Clone)]
pub struct PostgresDeliveryStore {
    pool: PgPool,
}

impl PostgresDeliveryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations/delivery").run(&self.pool).await?;
        Ok(())
    }

    async fn upsert(
        &self,
        saga_id: SagaId,
        address: &str,
        status_str: &str,
        status: DeliveryStatus,
    ) -> Result<DeliveryRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO deliveries (saga_id, tracking_id, address, status, updated_at)
            VALUES ($1, gen_random_uuid(), $2, $3, now())
            ON CONFLICT (saga_id) DO UPDATE SET status = $3, updated_at = now()
            RETURNING saga_id, tracking_id, updated_at
            "#,
        )
        .bind(saga_id.as_uuid())
        .bind(address)
        .bind(status_str)
        .fetch_one(&self.pool)
        .await?;

        Ok(DeliveryRecord {
            tracking_id: row.try_get("tracking_id")?,
            saga_id: SagaId::from_uuid(row.try_get("saga_id")?),
            status,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl DeliveryStore for PostgresDeliveryStore {
    async fn schedule(&self, saga_id: SagaId, address: &str) -> Result<DeliveryRecord> {
        self.upsert(saga_id, address, "SCHEDULED", DeliveryStatus::Scheduled).await
    }

    async fn cancel(&self, saga_id: SagaId) -> Result<DeliveryRecord> {
        self.upsert(saga_id, "", "CANCELLED", DeliveryStatus::Cancelled).await
    }
}

pub struct DeliveryService<S> {
    store: S,
}

impl<S: DeliveryStore> DeliveryService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: DeliveryStore> ParticipantService for DeliveryService<S> {
    async fn handle(&self, command: Command) -> std::result::Result<Reply, ParticipantError> {
        let address = command
            .payload
            .get("address")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let result = match command.command_type {
            CommandType::ScheduleDelivery => self.store.schedule(command.saga_id, &address).await,
            CommandType::CancelDelivery => self.store.cancel(command.saga_id).await,
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
                "delivery processed",
                HashMap::from([("tracking_id".to_string(), serde_json::json!(record.tracking_id))]),
            )),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schedule_is_idempotent_and_reuses_tracking_id() {
        let store = InMemoryDeliveryStore::new();
        let saga_id = SagaId::new();

        let first = store.schedule(saga_id, "221B Baker St").await.unwrap();
        let second = store.schedule(saga_id, "221B Baker St").await.unwrap();

        assert_eq!(first.tracking_id, second.tracking_id);
        assert_eq!(second.status, DeliveryStatus::Scheduled);
    }

    #[tokio::test]
    async fn cancel_with_no_prior_schedule_still_succeeds() {
        let store = InMemoryDeliveryStore::new();
        let record = store.cancel(SagaId::new()).await.unwrap();
        assert_eq!(record.status, DeliveryStatus::Cancelled);
    }
}
