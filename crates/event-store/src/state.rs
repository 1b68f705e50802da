use serde::{Deserialize, Serialize};

/// The state of a saga instance, as recorded in the event log.
///
/// States progress PENDING → ORDER_VALIDATED → STOCK_RESERVED →
/// PAYMENT_PROCESSED → DELIVERY_SCHEDULED → COMPLETED on the happy path,
/// or divert to COMPENSATING → FAILED from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaState {
    #[default]
    Pending,
    OrderValidated,
    StockReserved,
    PaymentProcessed,
    DeliveryScheduled,
    Completed,
    Compensating,
    Failed,
}

impl SagaState {
    /// Returns true once the saga cannot progress further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaState::Completed | SagaState::Failed)
    }

    /// Returns the state name as it appears in the event log and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::Pending => "PENDING",
            SagaState::OrderValidated => "ORDER_VALIDATED",
            SagaState::StockReserved => "STOCK_RESERVED",
            SagaState::PaymentProcessed => "PAYMENT_PROCESSED",
            SagaState::DeliveryScheduled => "DELIVERY_SCHEDULED",
            SagaState::Completed => "COMPLETED",
            SagaState::Compensating => "COMPENSATING",
            SagaState::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_pending() {
        assert_eq!(SagaState::default(), SagaState::Pending);
    }

    #[test]
    fn terminal_states() {
        assert!(!SagaState::Pending.is_terminal());
        assert!(!SagaState::Compensating.is_terminal());
        assert!(SagaState::Completed.is_terminal());
        assert!(SagaState::Failed.is_terminal());
    }

    #[test]
    fn serialization_uses_screaming_snake_case() {
        let json = serde_json::to_string(&SagaState::OrderValidated).unwrap();
        assert_eq!(json, "\"ORDER_VALIDATED\"");
        let round_tripped: SagaState = serde_json::from_str(&json).unwrap();
        assert_eq!(round_tripped, SagaState::OrderValidated);
    }
}
