use async_trait::async_trait;
use common::{OrderId, SagaId};
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::error::{EventLogError, Result};
use crate::event::SagaEventRecord;
use crate::state::SagaState;
use crate::store::EventLogStore;

/// Postgres-backed [`EventLogStore`], backed by the `saga_events` table.
#[derive(Debug, Clone)]
pub struct PostgresEventLog {
    pool: PgPool,
}

impl PostgresEventLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the embedded migrations against the connected database.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_record(row: sqlx::postgres::PgRow) -> Result<SagaEventRecord> {
        let state_str: String = row.try_get("state")?;
        let state = parse_state(&state_str)?;
        Ok(SagaEventRecord {
            sequence: Some(row.try_get("sequence")?),
            saga_id: SagaId::from_uuid(row.try_get("saga_id")?),
            order_id: OrderId::from_uuid(row.try_get("order_id")?),
            state,
            data: row.try_get("data")?,
            error: row.try_get("error")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

fn parse_state(value: &str) -> Result<SagaState> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(EventLogError::Serialization)
}

#[async_trait]
impl EventLogStore for PostgresEventLog {
    async fn append(&self, event: SagaEventRecord) -> Result<i64> {
        let state_str = event.state.as_str();
        let row = sqlx::query(
            r#"
            INSERT INTO saga_events (saga_id, order_id, state, data, error, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING sequence
            "#,
        )
        .bind(event.saga_id.as_uuid())
        .bind(event.order_id.as_uuid())
        .bind(state_str)
        .bind(&event.data)
        .bind(&event.error)
        .bind(event.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("sequence")?)
    }

    async fn latest_state(&self, saga_id: SagaId) -> Result<(SagaState, serde_json::Value)> {
        let row = sqlx::query(
            r#"
            SELECT state, data FROM saga_events
            WHERE saga_id = $1
            ORDER BY sequence DESC
            LIMIT 1
            "#,
        )
        .bind(saga_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or(EventLogError::SagaNotFound(saga_id))?;
        let state_str: String = row.try_get("state")?;
        let state = parse_state(&state_str)?;
        let data: serde_json::Value = row.try_get("data")?;
        Ok((state, data))
    }

    async fn history(&self, saga_id: SagaId) -> Result<Vec<SagaEventRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT sequence, saga_id, order_id, state, data, error, created_at
            FROM saga_events
            WHERE saga_id = $1
            ORDER BY sequence ASC
            "#,
        )
        .bind(saga_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }
}
