//! Message bus adapter: a `publish`/`consume` facade over the
//! at-least-once, per-partition-ordered log the orchestrator depends
//! on, plus an in-memory double for tests.

pub mod bus;
pub mod error;
pub mod kafka;
pub mod memory;

pub use bus::{ConsumedMessage, MessageBus, MessageHandler};
pub use error::{MessagingError, Result};
pub use kafka::{KafkaMessageBus, KafkaMessageBusBuilder};
pub use memory::InMemoryMessageBus;
