use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;

use crate::bus::{ConsumedMessage, MessageBus, MessageHandler};
use crate::error::{MessagingError, Result};

/// [`MessageBus`] backed by a Kafka (or Kafka-compatible) broker cluster.
#[derive(Clone)]
pub struct KafkaMessageBus {
    brokers: String,
    producer: FutureProducer,
    publish_timeout: Duration,
}

/// Builder for [`KafkaMessageBus`], mirroring the broker/timeout knobs a
/// production deployment needs to tune.
pub struct KafkaMessageBusBuilder {
    brokers: String,
    publish_timeout: Duration,
}

impl KafkaMessageBusBuilder {
    pub fn new(brokers: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            publish_timeout: Duration::from_secs(5),
        }
    }

    pub fn publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<KafkaMessageBus> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .create()?;

        Ok(KafkaMessageBus {
            brokers: self.brokers,
            producer,
            publish_timeout: self.publish_timeout,
        })
    }
}

impl KafkaMessageBus {
    pub fn builder(brokers: impl Into<String>) -> KafkaMessageBusBuilder {
        KafkaMessageBusBuilder::new(brokers)
    }

    fn consumer_for(&self, group: &str) -> Result<StreamConsumer> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", group)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .create()?;
        Ok(consumer)
    }
}

#[async_trait]
impl MessageBus for KafkaMessageBus {
    #[tracing::instrument(skip(self, payload), fields(topic, key))]
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<()> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        self.producer
            .send(record, Timeout::After(self.publish_timeout))
            .await
            .map_err(|(err, _)| err)?;

        metrics::counter!("messaging_publish_total", "topic" => topic.to_string()).increment(1);
        Ok(())
    }

    #[tracing::instrument(skip(self, handler), fields(group))]
    async fn consume(&self, topics: &[&str], group: &str, handler: MessageHandler) -> Result<()> {
        let consumer = self.consumer_for(group)?;
        let topic_names: Vec<&str> = topics.to_vec();
        consumer
            .subscribe(&topic_names)
            .map_err(MessagingError::Kafka)?;

        let mut stream = consumer.stream();
        while let Some(message) = stream.next().await {
            let message = match message {
                Ok(message) => message,
                Err(err) => {
                    tracing::warn!(error = %err, "kafka consumer error, skipping message");
                    continue;
                }
            };

            let consumed = ConsumedMessage {
                topic: message.topic().to_string(),
                key: message
                    .key()
                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned()),
                payload: message.payload().unwrap_or_default().to_vec(),
            };

            let acknowledged = handler(consumed).await;
            if acknowledged {
                if let Err(err) = consumer.commit_message(&message, CommitMode::Async) {
                    tracing::warn!(error = %err, "failed to commit kafka offset");
                }
            } else {
                tracing::warn!(
                    topic = message.topic(),
                    "handler reported failure, leaving message unacknowledged"
                );
            }
        }

        Ok(())
    }
}
