//! Pure state machine: `(current state, reply topic, success) -> action`.
//!
//! Nothing in this module performs I/O. The [`Orchestrator`](crate::engine::Orchestrator)
//! owns persistence and message publication; this module only decides
//! what should happen.

use std::collections::HashMap;

use domain::{CommandType, Step, ORDER_FULFILLMENT};
use event_store::SagaState;

/// What the orchestrator should do after folding a reply into the state
/// machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// The reply's own step (`completed_command`) just succeeded,
    /// reaching `next_state`; advance by issuing `command` on
    /// `command_topic`.
    Advance {
        completed_command: CommandType,
        next_state: SagaState,
        command: CommandType,
        command_topic: &'static str,
        context: HashMap<String, serde_json::Value>,
    },
    /// The saga's last step (`completed_command`) just succeeded,
    /// reaching `completed_state`; emit the terminal outcome and mark
    /// COMPLETED.
    Complete {
        completed_command: CommandType,
        completed_state: SagaState,
        context: HashMap<String, serde_json::Value>,
    },
    /// A step failed; begin compensation from `completed` in reverse order.
    Compensate {
        completed: Vec<&'static Step>,
        reason: String,
    },
    /// The reply is a duplicate of one already reflected in the saga's
    /// state, or arrived for an already-terminal saga; do nothing.
    Ignore,
}

/// Computes the action for a reply arriving on `reply_topic` against a
/// saga currently in `current_state`.
///
/// `current_state` must be the result of [`event_store::EventLogStore::latest_state`],
/// never an in-memory cache, so that redelivered replies are judged
/// against the durable truth.
pub fn next_action(
    current_state: SagaState,
    reply_topic: &str,
    success: bool,
    reply_data: HashMap<String, serde_json::Value>,
    reason: impl Into<String>,
) -> Action {
    if current_state.is_terminal() {
        return Action::Ignore;
    }

    let Some(step) = ORDER_FULFILLMENT.step_for_reply_topic(reply_topic) else {
        return Action::Ignore;
    };

    // Idempotency: a reply is only meaningful for the step currently
    // pending. If the saga has already moved past (or onto) this step's
    // success state, the reply is a duplicate.
    if step.success_state != next_expected_state(current_state) {
        return Action::Ignore;
    }

    if !success {
        let completed = ORDER_FULFILLMENT.completed_steps(current_state);
        return Action::Compensate {
            completed,
            reason: reason.into(),
        };
    }

    match ORDER_FULFILLMENT.next_after(step.success_state) {
        Some(next_step) => Action::Advance {
            completed_command: step.forward_command,
            next_state: step.success_state,
            command: next_step.forward_command,
            command_topic: next_step.command_topic,
            context: reply_data,
        },
        None => Action::Complete {
            completed_command: step.forward_command,
            completed_state: step.success_state,
            context: reply_data,
        },
    }
}

/// Returns the success state the saga is currently working towards.
fn next_expected_state(current_state: SagaState) -> SagaState {
    match current_state {
        SagaState::Pending => SagaState::OrderValidated,
        SagaState::OrderValidated => SagaState::StockReserved,
        SagaState::StockReserved => SagaState::PaymentProcessed,
        SagaState::PaymentProcessed => SagaState::DeliveryScheduled,
        // DeliveryScheduled has no further reply to wait on; any reply
        // topic match here is necessarily stale.
        SagaState::DeliveryScheduled | SagaState::Completed | SagaState::Compensating | SagaState::Failed => {
            SagaState::Completed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_plus_successful_orders_reply_advances_and_issues_reserve_stock() {
        let action = next_action(
            SagaState::Pending,
            "orders-reply",
            true,
            HashMap::new(),
            "",
        );

        assert_eq!(
            action,
            Action::Advance {
                completed_command: CommandType::ValidateOrder,
                next_state: SagaState::OrderValidated,
                command: CommandType::ReserveStock,
                command_topic: "stock-commands",
                context: HashMap::new(),
            }
        );
    }

    #[test]
    fn last_step_success_completes_rather_than_advances() {
        let action = next_action(
            SagaState::PaymentProcessed,
            "deliv-reply",
            true,
            HashMap::new(),
            "",
        );

        assert_eq!(
            action,
            Action::Complete {
                completed_command: CommandType::ScheduleDelivery,
                completed_state: SagaState::DeliveryScheduled,
                context: HashMap::new(),
            }
        );
    }

    #[test]
    fn failure_reply_triggers_compensation_of_completed_steps_reversed() {
        let action = next_action(
            SagaState::StockReserved,
            "pay-reply",
            false,
            HashMap::new(),
            "card declined",
        );

        match action {
            Action::Compensate { completed, reason } => {
                let compensations: Vec<_> =
                    completed.iter().rev().map(|s| s.compensation_command).collect();
                assert_eq!(
                    compensations,
                    vec![CommandType::ReleaseStock, CommandType::CancelOrder]
                );
                assert_eq!(reason, "card declined");
            }
            other => panic!("expected Compensate, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_reply_is_ignored() {
        // Saga already advanced past ORDER_VALIDATED; a second
        // orders-reply must be a no-op.
        let action = next_action(
            SagaState::StockReserved,
            "orders-reply",
            true,
            HashMap::new(),
            "",
        );
        assert_eq!(action, Action::Ignore);
    }

    #[test]
    fn reply_on_terminal_saga_is_ignored() {
        let action = next_action(
            SagaState::Completed,
            "orders-reply",
            true,
            HashMap::new(),
            "",
        );
        assert_eq!(action, Action::Ignore);
    }
}
