use std::sync::Arc;

use async_trait::async_trait;
use common::SagaId;
use tokio::sync::RwLock;

use crate::error::{EventLogError, Result};
use crate::event::SagaEventRecord;
use crate::state::SagaState;
use crate::store::EventLogStore;

/// In-memory [`EventLogStore`], used in tests and local development.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEventLog {
    events: Arc<RwLock<Vec<SagaEventRecord>>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventLogStore for InMemoryEventLog {
    async fn append(&self, mut event: SagaEventRecord) -> Result<i64> {
        let mut events = self.events.write().await;
        let sequence = events.len() as i64 + 1;
        event.sequence = Some(sequence);
        events.push(event);
        Ok(sequence)
    }

    async fn latest_state(&self, saga_id: SagaId) -> Result<(SagaState, serde_json::Value)> {
        let events = self.events.read().await;
        events
            .iter()
            .filter(|event| event.saga_id == saga_id)
            .max_by_key(|event| event.sequence)
            .map(|event| (event.state, event.data.clone()))
            .ok_or(EventLogError::SagaNotFound(saga_id))
    }

    async fn history(&self, saga_id: SagaId) -> Result<Vec<SagaEventRecord>> {
        let events = self.events.read().await;
        let mut history: Vec<SagaEventRecord> = events
            .iter()
            .filter(|event| event.saga_id == saga_id)
            .cloned()
            .collect();
        history.sort_by_key(|event| event.sequence);
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderId;

    fn record(saga_id: SagaId, order_id: OrderId, state: SagaState) -> SagaEventRecord {
        SagaEventRecord::new(saga_id, order_id, state, serde_json::json!({}), None)
    }

    #[tokio::test]
    async fn append_assigns_increasing_sequence() {
        let log = InMemoryEventLog::new();
        let saga_id = SagaId::new();
        let order_id = OrderId::new();

        let first = log
            .append(record(saga_id, order_id, SagaState::Pending))
            .await
            .unwrap();
        let second = log
            .append(record(saga_id, order_id, SagaState::OrderValidated))
            .await
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn latest_state_returns_most_recent_event() {
        let log = InMemoryEventLog::new();
        let saga_id = SagaId::new();
        let order_id = OrderId::new();

        log.append(record(saga_id, order_id, SagaState::Pending))
            .await
            .unwrap();
        log.append(record(saga_id, order_id, SagaState::StockReserved))
            .await
            .unwrap();

        let (state, _) = log.latest_state(saga_id).await.unwrap();
        assert_eq!(state, SagaState::StockReserved);
    }

    #[tokio::test]
    async fn latest_state_of_unknown_saga_errors() {
        let log = InMemoryEventLog::new();
        let err = log.latest_state(SagaId::new()).await.unwrap_err();
        assert!(matches!(err, EventLogError::SagaNotFound(_)));
    }

    #[tokio::test]
    async fn history_is_ordered_and_scoped_to_saga() {
        let log = InMemoryEventLog::new();
        let saga_id = SagaId::new();
        let other_id = SagaId::new();
        let order_id = OrderId::new();

        log.append(record(saga_id, order_id, SagaState::Pending))
            .await
            .unwrap();
        log.append(record(other_id, order_id, SagaState::Pending))
            .await
            .unwrap();
        log.append(record(saga_id, order_id, SagaState::OrderValidated))
            .await
            .unwrap();

        let history = log.history(saga_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].state, SagaState::Pending);
        assert_eq!(history[1].state, SagaState::OrderValidated);
    }
}
