use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown topic: {0}")]
    UnknownTopic(String),
}

pub type Result<T> = std::result::Result<T, MessagingError>;
