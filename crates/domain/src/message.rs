//! Wire envelopes exchanged between the orchestrator and participants.

use chrono::{DateTime, Utc};
use common::{CommandId, OrderId, ReplyId, SagaId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The closed set of command types a participant may receive.
///
/// Forward variants progress a saga; compensating variants undo the
/// effect of a previously successful forward command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    ValidateOrder,
    ReserveStock,
    ProcessPayment,
    ScheduleDelivery,
    CancelOrder,
    ReleaseStock,
    CancelPayment,
    CancelDelivery,
}

impl CommandType {
    /// Returns true for the four commands that progress a saga forward.
    pub fn is_forward(&self) -> bool {
        matches!(
            self,
            CommandType::ValidateOrder
                | CommandType::ReserveStock
                | CommandType::ProcessPayment
                | CommandType::ScheduleDelivery
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::ValidateOrder => "VALIDATE_ORDER",
            CommandType::ReserveStock => "RESERVE_STOCK",
            CommandType::ProcessPayment => "PROCESS_PAYMENT",
            CommandType::ScheduleDelivery => "SCHEDULE_DELIVERY",
            CommandType::CancelOrder => "CANCEL_ORDER",
            CommandType::ReleaseStock => "RELEASE_STOCK",
            CommandType::CancelPayment => "CANCEL_PAYMENT",
            CommandType::CancelDelivery => "CANCEL_DELIVERY",
        }
    }
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An addressed envelope sent from the orchestrator to a participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub command_id: CommandId,
    pub saga_id: SagaId,
    pub order_id: OrderId,
    pub command_type: CommandType,
    pub payload: HashMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl Command {
    pub fn new(
        saga_id: SagaId,
        order_id: OrderId,
        command_type: CommandType,
        payload: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            command_id: CommandId::new(),
            saga_id,
            order_id,
            command_type,
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// A participant's response to a [`Command`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub reply_id: ReplyId,
    pub command_id: CommandId,
    pub saga_id: SagaId,
    pub success: bool,
    pub message: String,
    pub data: HashMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl Reply {
    pub fn success(
        command_id: CommandId,
        saga_id: SagaId,
        message: impl Into<String>,
        data: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            reply_id: ReplyId::new(),
            command_id,
            saga_id,
            success: true,
            message: message.into(),
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(command_id: CommandId, saga_id: SagaId, message: impl Into<String>) -> Self {
        Self {
            reply_id: ReplyId::new(),
            command_id,
            saga_id,
            success: false,
            message: message.into(),
            data: HashMap::new(),
            timestamp: Utc::now(),
        }
    }
}

/// The status reported on [`TerminalOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    Completed,
    Failed,
}

/// Published on the outcome topic once a saga reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalOutcome {
    pub saga_id: SagaId,
    pub order_id: OrderId,
    pub status: OutcomeStatus,
    pub timestamp: DateTime<Utc>,
    pub data: HashMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_type_round_trips_through_json() {
        let json = serde_json::to_string(&CommandType::ReserveStock).unwrap();
        assert_eq!(json, "\"RESERVE_STOCK\"");
        let parsed: CommandType = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, CommandType::ReserveStock);
    }

    #[test]
    fn forward_commands_are_distinguished_from_compensations() {
        assert!(CommandType::ValidateOrder.is_forward());
        assert!(!CommandType::CancelOrder.is_forward());
    }

    #[test]
    fn reply_failure_carries_no_data() {
        let reply = Reply::failure(CommandId::new(), SagaId::new(), "out of stock");
        assert!(!reply.success);
        assert!(reply.data.is_empty());
    }
}
