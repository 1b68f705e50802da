//! The static, ordered saga definition (spec §4.1).

use event_store::SagaState;

use crate::message::CommandType;

/// One forward step of the saga, paired with its compensation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub forward_command: CommandType,
    pub command_topic: &'static str,
    pub reply_topic: &'static str,
    pub success_state: SagaState,
    pub compensation_command: CommandType,
    pub compensation_topic: &'static str,
}

/// The immutable, compile-time-ordered list of saga steps.
///
/// The state machine is driven entirely by "which step are we on";
/// compensation order falls out mechanically as the reverse of the
/// steps already completed.
#[derive(Debug, Clone, Copy)]
pub struct SagaDefinition {
    steps: &'static [Step],
}

/// The canonical four-step order fulfillment saga.
pub static ORDER_FULFILLMENT: SagaDefinition = SagaDefinition { steps: &STEPS };

static STEPS: [Step; 4] = [
    Step {
        forward_command: CommandType::ValidateOrder,
        command_topic: "orders-commands",
        reply_topic: "orders-reply",
        success_state: SagaState::OrderValidated,
        compensation_command: CommandType::CancelOrder,
        compensation_topic: "orders-commands",
    },
    Step {
        forward_command: CommandType::ReserveStock,
        command_topic: "stock-commands",
        reply_topic: "stock-reply",
        success_state: SagaState::StockReserved,
        compensation_command: CommandType::ReleaseStock,
        compensation_topic: "stock-commands",
    },
    Step {
        forward_command: CommandType::ProcessPayment,
        command_topic: "pay-commands",
        reply_topic: "pay-reply",
        success_state: SagaState::PaymentProcessed,
        compensation_command: CommandType::CancelPayment,
        compensation_topic: "pay-commands",
    },
    Step {
        forward_command: CommandType::ScheduleDelivery,
        command_topic: "deliv-commands",
        reply_topic: "deliv-reply",
        success_state: SagaState::DeliveryScheduled,
        compensation_command: CommandType::CancelDelivery,
        compensation_topic: "deliv-commands",
    },
];

impl SagaDefinition {
    /// Returns the full ordered step list.
    pub fn steps(&self) -> &'static [Step] {
        self.steps
    }

    /// Returns the step whose reply arrives on `reply_topic`, if any.
    pub fn step_for_reply_topic(&self, reply_topic: &str) -> Option<&'static Step> {
        self.steps.iter().find(|step| step.reply_topic == reply_topic)
    }

    /// Returns the step whose forward command is `command_type`, if any.
    pub fn step_for_command(&self, command_type: CommandType) -> Option<&'static Step> {
        self.steps
            .iter()
            .find(|step| step.forward_command == command_type)
    }

    /// Returns the index (0-based) of a step by its forward command type.
    pub fn step_index(&self, command_type: CommandType) -> Option<usize> {
        self.steps
            .iter()
            .position(|step| step.forward_command == command_type)
    }

    /// Returns the step reached immediately after `state`, i.e. the step
    /// whose execution produces that successor state.
    pub fn step_completed_at(&self, state: SagaState) -> Option<&'static Step> {
        self.steps.iter().find(|step| step.success_state == state)
    }

    /// Returns the first step of the saga.
    pub fn first(&self) -> &'static Step {
        &self.steps[0]
    }

    /// Returns the step following the one that produced `state`, or
    /// `None` if `state` is the last step's success state (saga completes).
    pub fn next_after(&self, state: SagaState) -> Option<&'static Step> {
        let index = self.steps.iter().position(|step| step.success_state == state)?;
        self.steps.get(index + 1)
    }

    /// Returns the steps already completed given the current state, in
    /// the order they were executed (index 0 first).
    pub fn completed_steps(&self, state: SagaState) -> Vec<&'static Step> {
        match self.steps.iter().position(|step| step.success_state == state) {
            Some(index) => self.steps[..=index].iter().collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_steps_in_spec_order() {
        let steps = ORDER_FULFILLMENT.steps();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0].forward_command, CommandType::ValidateOrder);
        assert_eq!(steps[3].forward_command, CommandType::ScheduleDelivery);
    }

    #[test]
    fn next_after_chains_steps_and_terminates() {
        let first = ORDER_FULFILLMENT.first();
        assert_eq!(first.forward_command, CommandType::ValidateOrder);

        let second = ORDER_FULFILLMENT.next_after(SagaState::OrderValidated).unwrap();
        assert_eq!(second.forward_command, CommandType::ReserveStock);

        assert!(ORDER_FULFILLMENT
            .next_after(SagaState::DeliveryScheduled)
            .is_none());
    }

    #[test]
    fn completed_steps_reversed_gives_compensation_order() {
        let completed = ORDER_FULFILLMENT.completed_steps(SagaState::StockReserved);
        let reversed: Vec<_> = completed.iter().rev().map(|s| s.compensation_command).collect();
        assert_eq!(
            reversed,
            vec![CommandType::ReleaseStock, CommandType::CancelOrder]
        );
    }
}
