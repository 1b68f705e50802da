//! Orders participant: validates that an order is well-formed before
//! the rest of the saga proceeds, and cancels it on compensation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, SagaId};
use domain::{Command, CommandType, Reply};
use sqlx::{PgPool, Row};
use tokio::sync::RwLock;

use crate::error::{ParticipantError, Result};
use crate::service::ParticipantService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Validated,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct OrderRecord {
    pub order_id: OrderId,
    pub saga_id: SagaId,
    pub status: OrderStatus,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait OrdersStore: Send + Sync {
    async fn validate(&self, saga_id: SagaId, order_id: OrderId) -> Result<OrderRecord>;
    async fn cancel(&self, saga_id: SagaId, order_id: OrderId) -> Result<OrderRecord>;
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryOrdersStore {
    records: Arc<RwLock<HashMap<SagaId, OrderRecord>>>,
}

impl InMemoryOrdersStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrdersStore for InMemoryOrdersStore {
    async fn validate(&self, saga_id: SagaId, order_id: OrderId) -> Result<OrderRecord> {
        let mut records = self.records.write().await;
        let record = records.entry(saga_id).or_insert_with(|| OrderRecord {
            order_id,
            saga_id,
            status: OrderStatus::Validated,
            updated_at: Utc::now(),
        });
        record.status = OrderStatus::Validated;
        Ok(record.clone())
    }

    async fn cancel(&self, saga_id: SagaId, order_id: OrderId) -> Result<OrderRecord> {
        let mut records = self.records.write().await;
        let record = records.entry(saga_id).or_insert_with(|| OrderRecord {
            order_id,
            saga_id,
            status: OrderStatus::Cancelled,
            updated_at: Utc::now(),
        });
        record.status = OrderStatus::Cancelled;
        Ok(record.clone())
    }
}

#[derive(Debug, Clone)]
pub struct PostgresOrdersStore {
    pool: PgPool,
}

impl PostgresOrdersStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations/orders").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl OrdersStore for PostgresOrdersStore {
    async fn validate(&self, saga_id: SagaId, order_id: OrderId) -> Result<OrderRecord> {
        self.upsert(saga_id, order_id, "VALIDATED", OrderStatus::Validated)
            .await
    }

    async fn cancel(&self, saga_id: SagaId, order_id: OrderId) -> Result<OrderRecord> {
        self.upsert(saga_id, order_id, "CANCELLED", OrderStatus::Cancelled)
            .await
    }
}

impl PostgresOrdersStore {
    async fn upsert(
        &self,
        saga_id: SagaId,
        order_id: OrderId,
        status_str: &str,
        status: OrderStatus,
    ) -> Result<OrderRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO orders (saga_id, order_id, status, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (saga_id) DO UPDATE SET status = $3, updated_at = now()
            RETURNING saga_id, order_id, updated_at
            "#,
        )
        .bind(saga_id.as_uuid())
        .bind(order_id.as_uuid())
        .bind(status_str)
        .fetch_one(&self.pool)
        .await?;

        Ok(OrderRecord {
            order_id: OrderId::from_uuid(row.try_get("order_id")?),
            saga_id: SagaId::from_uuid(row.try_get("saga_id")?),
            status,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

pub struct OrdersService<S> {
    store: S,
}

impl<S: OrdersStore> OrdersService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: OrdersStore> ParticipantService for OrdersService<S> {
    async fn handle(&self, command: Command) -> std::result::Result<Reply, ParticipantError> {
        let result = match command.command_type {
            CommandType::ValidateOrder => self.store.validate(command.saga_id, command.order_id).await,
            CommandType::CancelOrder => self.store.cancel(command.saga_id, command.order_id).await,
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
                "order processed",
                HashMap::from([(
                    "order_status".to_string(),
                    serde_json::json!(format!("{:?}", record.status).to_uppercase()),
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
    async fn validate_is_idempotent() {
        let store = InMemoryOrdersStore::new();
        let saga_id = SagaId::new();
        let order_id = OrderId::new();

        store.validate(saga_id, order_id).await.unwrap();
        let second = store.validate(saga_id, order_id).await.unwrap();

        assert_eq!(second.status, OrderStatus::Validated);
    }

    #[tokio::test]
    async fn cancel_with_no_prior_state_still_succeeds() {
        let store = InMemoryOrdersStore::new();
        let record = store.cancel(SagaId::new(), OrderId::new()).await.unwrap();
        assert_eq!(record.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn unknown_command_yields_failure_reply() {
        let service = OrdersService::new(InMemoryOrdersStore::new());
        let command = Command::new(SagaId::new(), OrderId::new(), CommandType::ReserveStock, HashMap::new());
        let reply = service.handle(command).await.unwrap();
        assert!(!reply.success);
    }
}
