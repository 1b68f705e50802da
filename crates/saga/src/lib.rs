//! Orchestrated saga for distributed order fulfillment.
//!
//! The order fulfillment saga drives four participants in sequence:
//! order validation, stock reservation, payment, and delivery
//! scheduling. If any step fails, previously completed steps are
//! compensated in reverse order and the saga ends FAILED.

pub mod aggregate;
pub mod engine;
pub mod error;
pub mod state_machine;

pub use aggregate::SagaInstance;
pub use engine::Orchestrator;
pub use error::{Result, SagaError};
pub use state_machine::Action;
