use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// A single message handed to a consumer, already read off the bus.
#[derive(Debug, Clone)]
pub struct ConsumedMessage {
    pub topic: String,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

/// A handler invoked for each consumed message. Returns `true` to
/// acknowledge the message (commit its offset) or `false` to leave it
/// unacknowledged for redelivery.
pub type MessageHandler =
    Arc<dyn Fn(ConsumedMessage) -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync>;

/// Adapter over a partitioned, at-least-once log message bus.
///
/// Implementations must route messages sharing a `key` to the same
/// partition (so a single consumer instance observes them in order),
/// and must only commit an offset after `handler` reports success.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publishes a message to `topic`, partitioned by `key`.
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<()>;

    /// Subscribes to `topics` as consumer group `group` and processes
    /// messages with `handler` until the bus is shut down. Offsets are
    /// committed only after `handler` returns `true`.
    async fn consume(&self, topics: &[&str], group: &str, handler: MessageHandler) -> Result<()>;
}
