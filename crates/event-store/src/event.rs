use chrono::{DateTime, Utc};
use common::{OrderId, SagaId};
use serde::{Deserialize, Serialize};

use crate::state::SagaState;

/// A single append-only record in the saga event log.
///
/// `sequence` is assigned by the store on append and totally orders
/// events within a saga id; it is never reused or reassigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaEventRecord {
    /// Sequence number assigned by the store. `None` until appended.
    pub sequence: Option<i64>,
    pub saga_id: SagaId,
    pub order_id: OrderId,
    pub state: SagaState,
    /// Context payload snapshot at the time this event was recorded.
    pub data: serde_json::Value,
    /// Set when this event records a failure.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SagaEventRecord {
    /// Builds a new, not-yet-persisted event record.
    pub fn new(
        saga_id: SagaId,
        order_id: OrderId,
        state: SagaState,
        data: serde_json::Value,
        error: Option<String>,
    ) -> Self {
        Self {
            sequence: None,
            saga_id,
            order_id,
            state,
            data,
            error,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_has_no_sequence_yet() {
        let record = SagaEventRecord::new(
            SagaId::new(),
            OrderId::new(),
            SagaState::Pending,
            serde_json::json!({}),
            None,
        );
        assert!(record.sequence.is_none());
        assert!(record.error.is_none());
    }

    #[test]
    fn serialization_roundtrip() {
        let record = SagaEventRecord::new(
            SagaId::new(),
            OrderId::new(),
            SagaState::Failed,
            serde_json::json!({"reason": "stock"}),
            Some("stock reservation failed".to_string()),
        );
        let json = serde_json::to_string(&record).unwrap();
        let restored: SagaEventRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.saga_id, record.saga_id);
        assert_eq!(restored.state, SagaState::Failed);
        assert_eq!(restored.error.as_deref(), Some("stock reservation failed"));
    }
}
