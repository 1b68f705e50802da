use async_trait::async_trait;
use common::SagaId;

use crate::error::Result;
use crate::event::SagaEventRecord;
use crate::state::SagaState;

/// Append-only log of saga events, and the read operations the
/// orchestrator needs to rebuild a saga's current state.
///
/// Implementations must guarantee that `append` assigns each record a
/// strictly increasing `sequence` within a given `saga_id`, and that
/// `history` returns records ordered by that sequence.
#[async_trait]
pub trait EventLogStore: Send + Sync {
    /// Appends a new event to the log, returning the sequence number
    /// assigned to it.
    async fn append(&self, event: SagaEventRecord) -> Result<i64>;

    /// Returns the most recently recorded state and context data for a
    /// saga, or `SagaNotFound` if no events have been recorded for it.
    async fn latest_state(&self, saga_id: SagaId) -> Result<(SagaState, serde_json::Value)>;

    /// Returns the full, sequence-ordered event history for a saga.
    async fn history(&self, saga_id: SagaId) -> Result<Vec<SagaEventRecord>>;
}

/// Convenience helpers built on top of [`EventLogStore`]'s primitive operations.
#[async_trait]
pub trait EventLogStoreExt: EventLogStore {
    /// Returns true if any event has ever been recorded for this saga.
    async fn exists(&self, saga_id: SagaId) -> Result<bool> {
        match self.latest_state(saga_id).await {
            Ok(_) => Ok(true),
            Err(crate::error::EventLogError::SagaNotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

impl<T: EventLogStore + ?Sized> EventLogStoreExt for T {}
