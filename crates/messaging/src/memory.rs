use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::bus::{ConsumedMessage, MessageBus, MessageHandler};
use crate::error::Result;

/// In-process [`MessageBus`] used in tests. Messages are held per topic
/// in FIFO queues; `consume` drains whatever is currently queued for
/// its topics and then returns, rather than blocking forever.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMessageBus {
    topics: Arc<Mutex<HashMap<String, VecDeque<ConsumedMessage>>>>,
}

impl InMemoryMessageBus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<()> {
        let mut topics = self.topics.lock().await;
        topics
            .entry(topic.to_string())
            .or_default()
            .push_back(ConsumedMessage {
                topic: topic.to_string(),
                key: Some(key.to_string()),
                payload: payload.to_vec(),
            });
        Ok(())
    }

    async fn consume(&self, topics: &[&str], _group: &str, handler: MessageHandler) -> Result<()> {
        loop {
            let next = {
                let mut queues = self.topics.lock().await;
                topics
                    .iter()
                    .find_map(|topic| queues.get_mut(*topic).and_then(|queue| queue.pop_front()))
            };

            let Some(message) = next else {
                return Ok(());
            };

            let acknowledged = handler(message.clone()).await;
            if !acknowledged {
                let mut queues = self.topics.lock().await;
                queues
                    .entry(message.topic.clone())
                    .or_default()
                    .push_front(message);
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn publish_then_consume_drains_queue() {
        let bus = InMemoryMessageBus::new();
        bus.publish("orders-commands", "saga-1", b"first")
            .await
            .unwrap();
        bus.publish("orders-commands", "saga-1", b"second")
            .await
            .unwrap();

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let handler: MessageHandler = Arc::new(move |_message| {
            let seen = seen_clone.clone();
            Box::pin(async move {
                seen.fetch_add(1, Ordering::SeqCst);
                true
            })
        });

        bus.consume(&["orders-commands"], "test-group", handler)
            .await
            .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_handler_requeues_message() {
        let bus = InMemoryMessageBus::new();
        bus.publish("stock-commands", "saga-1", b"payload")
            .await
            .unwrap();

        let failing: MessageHandler = Arc::new(|_message| Box::pin(async { false }));
        bus.consume(&["stock-commands"], "test-group", failing)
            .await
            .unwrap();

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let succeeding: MessageHandler = Arc::new(move |message| {
            let seen = seen_clone.clone();
            Box::pin(async move {
                assert_eq!(message.payload, b"payload");
                seen.fetch_add(1, Ordering::SeqCst);
                true
            })
        });
        bus.consume(&["stock-commands"], "test-group", succeeding)
            .await
            .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
