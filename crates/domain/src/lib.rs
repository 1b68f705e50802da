//! Domain layer for the saga orchestrator.
//!
//! This crate provides the core domain abstractions: the `Aggregate`
//! and `DomainEvent` traits, the wire-level `Command`/`Reply` envelopes,
//! the static saga definition, and the rich `SagaEvent` enum recorded
//! alongside each state transition.

pub mod aggregate;
pub mod definition;
pub mod error;
pub mod message;
pub mod payload;
pub mod saga_event;

pub use aggregate::{Aggregate, DomainEvent};
pub use definition::{SagaDefinition, Step, ORDER_FULFILLMENT};
pub use error::DomainError;
pub use message::{Command, CommandType, OutcomeStatus, Reply, TerminalOutcome};
pub use payload::OrderPayload;
pub use saga_event::SagaEvent;
