//! The rich, in-memory domain event counterpart to the flat
//! [`event_store::SagaEventRecord`] persisted to the log.

use common::{OrderId, SagaId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::aggregate::DomainEvent;
use crate::message::CommandType;

/// Facts that can happen to a saga instance over its lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SagaEvent {
    SagaStarted {
        saga_id: SagaId,
        order_id: OrderId,
        context: HashMap<String, serde_json::Value>,
    },
    StepCompleted {
        command_type: CommandType,
        context: HashMap<String, serde_json::Value>,
    },
    StepFailed {
        command_type: CommandType,
        reason: String,
    },
    CompensationStarted {
        reason: String,
    },
    CompensationStepCompleted {
        command_type: CommandType,
    },
    SagaCompleted {
        context: HashMap<String, serde_json::Value>,
    },
    SagaFailed {
        reason: String,
    },
}

impl SagaEvent {
    pub fn started(
        saga_id: SagaId,
        order_id: OrderId,
        context: HashMap<String, serde_json::Value>,
    ) -> Self {
        SagaEvent::SagaStarted {
            saga_id,
            order_id,
            context,
        }
    }

    pub fn step_completed(
        command_type: CommandType,
        context: HashMap<String, serde_json::Value>,
    ) -> Self {
        SagaEvent::StepCompleted {
            command_type,
            context,
        }
    }

    pub fn step_failed(command_type: CommandType, reason: impl Into<String>) -> Self {
        SagaEvent::StepFailed {
            command_type,
            reason: reason.into(),
        }
    }

    pub fn compensation_started(reason: impl Into<String>) -> Self {
        SagaEvent::CompensationStarted {
            reason: reason.into(),
        }
    }

    pub fn compensation_step_completed(command_type: CommandType) -> Self {
        SagaEvent::CompensationStepCompleted { command_type }
    }

    pub fn completed(context: HashMap<String, serde_json::Value>) -> Self {
        SagaEvent::SagaCompleted { context }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        SagaEvent::SagaFailed {
            reason: reason.into(),
        }
    }
}

impl DomainEvent for SagaEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SagaEvent::SagaStarted { .. } => "SagaStarted",
            SagaEvent::StepCompleted { .. } => "StepCompleted",
            SagaEvent::StepFailed { .. } => "StepFailed",
            SagaEvent::CompensationStarted { .. } => "CompensationStarted",
            SagaEvent::CompensationStepCompleted { .. } => "CompensationStepCompleted",
            SagaEvent::SagaCompleted { .. } => "SagaCompleted",
            SagaEvent::SagaFailed { .. } => "SagaFailed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_names_match_variants() {
        assert_eq!(
            SagaEvent::started(SagaId::new(), OrderId::new(), HashMap::new()).event_type(),
            "SagaStarted"
        );
        assert_eq!(SagaEvent::failed("timeout").event_type(), "SagaFailed");
    }

    #[test]
    fn serializes_as_tagged_variant() {
        let event = SagaEvent::step_failed(CommandType::ReserveStock, "out of stock");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "StepFailed");
        assert_eq!(json["data"]["reason"], "out of stock");
    }
}
