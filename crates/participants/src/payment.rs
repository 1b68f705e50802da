//! Payment participant: charges the order total, cancels the charge on
//! compensation.

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
pub enum PaymentStatus {
    Approved,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub payment_id: Uuid,
    pub saga_id: SagaId,
    pub status: PaymentStatus,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn charge(&self, saga_id: SagaId, amount: f64) -> Result<PaymentRecord>;
    async fn cancel(&self, saga_id: SagaId) -> Result<PaymentRecord>;
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryPaymentStore {
    records: Arc<RwLock<HashMap<SagaId, PaymentRecord>>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn charge(&self, saga_id: SagaId, _amount: f64) -> Result<PaymentRecord> {
        let mut records = self.records.write().await;
        let record = records.entry(saga_id).or_insert_with(|| PaymentRecord {
            payment_id: Uuid::new_v4(),
            saga_id,
            status: PaymentStatus::Approved,
            updated_at: Utc::now(),
        });
        record.status = PaymentStatus::Approved;
        Ok(record.clone())
    }

    async fn cancel(&self, saga_id: SagaId) -> Result<PaymentRecord> {
        let mut records = self.records.write().await;
        let record = records.entry(saga_id).or_insert_with(|| PaymentRecord {
            payment_id: Uuid::new_v4(),
            saga_id,
            status: PaymentStatus::Cancelled,
            updated_at: Utc::now(),
        });
        record.status = PaymentStatus::Cancelled;
        Ok(record.clone())
    }
}

#[derive(Debug, Clone)]
pub struct PostgresPaymentStore {
    pool: PgPool,
}

impl PostgresPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations/payment").run(&self.pool).await?;
        Ok(())
    }

    async fn upsert(
        &self,
        saga_id: SagaId,
        amount: f64,
        status_str: &str,
        status: PaymentStatus,
    ) -> Result<PaymentRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO payments (saga_id, payment_id, amount, status, updated_at)
            VALUES ($1, gen_random_uuid(), $2, $3, now())
            ON CONFLICT (saga_id) DO UPDATE SET status = $3, updated_at = now()
            RETURNING saga_id, payment_id, updated_at
            "#,
        )
        .bind(saga_id.as_uuid())
        .bind(amount)
        .bind(status_str)
        .fetch_one(&self.pool)
        .await?;

        Ok(PaymentRecord {
            payment_id: row.try_get("payment_id")?,
            saga_id: SagaId::from_uuid(row.try_get("saga_id")?),
            status,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl PaymentStore for PostgresPaymentStore {
    async fn charge(&self, saga_id: SagaId, amount: f64) -> Result<PaymentRecord> {
        self.upsert(saga_id, amount, "APPROVED", PaymentStatus::Approved).await
    }

    async fn cancel(&self, saga_id: SagaId) -> Result<PaymentRecord> {
        self.upsert(saga_id, 0.0, "CANCELLED", PaymentStatus::Cancelled).await
    }
}

pub struct PaymentService<S> {
    store: S,
}

impl<S: PaymentStore> PaymentService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: PaymentStore> ParticipantService for PaymentService<S> {
    async fn handle(&self, command: Command) -> std::result::Result<Reply, ParticipantError> {
        let amount = command
            .payload
            .get("total_amount")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);

        let result = match command.command_type {
            CommandType::ProcessPayment => self.store.charge(command.saga_id, amount).await,
            CommandType::CancelPayment => self.store.cancel(command.saga_id).await,
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
                "payment processed",
                HashMap::from([("payment_id".to_string(), serde_json::json!(record.payment_id))]),
            )),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn charge_is_idempotent_and_reuses_payment_id() {
        let store = InMemoryPaymentStore::new();
        let saga_id = SagaId::new();

        let first = store.charge(saga_id, 42.0).await.unwrap();
        let second = store.charge(saga_id, 42.0).await.unwrap();

        assert_eq!(first.payment_id, second.payment_id);
        assert_eq!(second.status, PaymentStatus::Approved);
    }

    #[tokio::test]
    async fn cancel_with_no_prior_charge_still_succeeds() {
        let store = InMemoryPaymentStore::new();
        let record = store.cancel(SagaId::new()).await.unwrap();
        assert_eq!(record.status, PaymentStatus::Cancelled);
    }
}
