//! `SagaInstance`: the replayable, in-memory view of a saga's progress.
//!
//! Rebuilt by folding the [`SagaEvent`] history over a fresh default
//! instance; never held across requests by the orchestrator, only
//! reconstructed on demand from the event log.

use std::collections::HashMap;

use common::{OrderId, SagaId};
use domain::{Aggregate, CommandType, DomainEvent, SagaEvent};
use event_store::{SagaEventRecord, SagaState};

use crate::error::Result;

/// The replay target for a saga's event history.
#[derive(Debug, Clone, Default)]
pub struct SagaInstance {
    pub saga_id: Option<SagaId>,
    pub order_id: Option<OrderId>,
    pub state: SagaState,
    pub context: HashMap<String, serde_json::Value>,
    /// Forward command types whose step has completed, in order.
    pub completed_steps: Vec<CommandType>,
    /// Compensation command types already issued, in order.
    pub compensated_steps: Vec<CommandType>,
    pub failure_reason: Option<String>,
    version: i64,
}

impl SagaInstance {
    /// Rebuilds a saga instance by folding its event history.
    pub fn replay(events: impl IntoIterator<Item = SagaEvent>) -> Self {
        let mut instance = Self::default();
        instance.apply_events(events);
        instance
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Rebuilds a saga instance from the event log's raw records,
    /// decoding each record's `data` column back into a [`SagaEvent`].
    pub fn from_records(records: &[SagaEventRecord]) -> Result<Self> {
        let events = records
            .iter()
            .map(|record| serde_json::from_value(record.data.clone()))
            .collect::<std::result::Result<Vec<SagaEvent>, _>>()?;
        Ok(Self::replay(events))
    }
}

impl Aggregate for SagaInstance {
    type Event = SagaEvent;

    fn aggregate_type() -> &'static str {
        "SagaInstance"
    }

    fn id(&self) -> Option<SagaId> {
        self.saga_id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            SagaEvent::SagaStarted {
                saga_id,
                order_id,
                context,
            } => {
                self.saga_id = Some(saga_id);
                self.order_id = Some(order_id);
                self.state = SagaState::Pending;
                self.context = context;
            }
            SagaEvent::StepCompleted {
                command_type,
                context,
            } => {
                self.context.extend(context);
                self.completed_steps.push(command_type);
                if let Some(step) = domain::ORDER_FULFILLMENT.step_for_command(command_type) {
                    self.state = step.success_state;
                }
            }
            SagaEvent::StepFailed {
                reason,
                ..
            } => {
                self.state = SagaState::Compensating;
                self.failure_reason = Some(reason);
            }
            SagaEvent::CompensationStarted { reason } => {
                self.state = SagaState::Compensating;
                self.failure_reason = Some(reason);
            }
            SagaEvent::CompensationStepCompleted { command_type } => {
                self.compensated_steps.push(command_type);
            }
            SagaEvent::SagaCompleted { context } => {
                self.context.extend(context);
                self.state = SagaState::Completed;
            }
            SagaEvent::SagaFailed { reason } => {
                self.state = SagaState::Failed;
                self.failure_reason = Some(reason);
            }
        }
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_reconstructs_state_from_history() {
        let saga_id = SagaId::new();
        let order_id = OrderId::new();

        let instance = SagaInstance::replay(vec![
            SagaEvent::started(saga_id, order_id, HashMap::new()),
            SagaEvent::step_completed(CommandType::ValidateOrder, HashMap::new()),
            SagaEvent::step_completed(CommandType::ReserveStock, HashMap::new()),
        ]);

        assert_eq!(instance.saga_id, Some(saga_id));
        assert_eq!(instance.state, SagaState::StockReserved);
        assert_eq!(instance.completed_steps.len(), 2);
    }

    #[test]
    fn step_failure_moves_to_compensating() {
        let instance = SagaInstance::replay(vec![
            SagaEvent::started(SagaId::new(), OrderId::new(), HashMap::new()),
            SagaEvent::step_completed(CommandType::ValidateOrder, HashMap::new()),
            SagaEvent::step_failed(CommandType::ReserveStock, "out of stock"),
        ]);

        assert_eq!(instance.state, SagaState::Compensating);
        assert_eq!(instance.failure_reason.as_deref(), Some("out of stock"));
    }

    #[test]
    fn saga_completed_event_reaches_terminal_state() {
        let instance = SagaInstance::replay(vec![
            SagaEvent::started(SagaId::new(), OrderId::new(), HashMap::new()),
            SagaEvent::completed(HashMap::new()),
        ]);

        assert!(instance.is_terminal());
        assert_eq!(instance.state, SagaState::Completed);
    }

    #[test]
    fn from_records_decodes_stored_event_payloads() {
        let saga_id = SagaId::new();
        let order_id = OrderId::new();

        let records = vec![
            SagaEventRecord::new(
                saga_id,
                order_id,
                SagaState::Pending,
                serde_json::to_value(SagaEvent::started(saga_id, order_id, HashMap::new())).unwrap(),
                None,
            ),
            SagaEventRecord::new(
                saga_id,
                order_id,
                SagaState::OrderValidated,
                serde_json::to_value(SagaEvent::step_completed(CommandType::ValidateOrder, HashMap::new()))
                    .unwrap(),
                None,
            ),
        ];

        let instance = SagaInstance::from_records(&records).unwrap();
        assert_eq!(instance.state, SagaState::OrderValidated);
        assert_eq!(instance.saga_id, Some(saga_id));
    }
}
