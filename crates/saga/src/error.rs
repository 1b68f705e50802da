//! Saga error types.

use common::SagaId;
use domain::DomainError;
use event_store::EventLogError;
use messaging::MessagingError;
use thiserror::Error;

/// Errors that can occur while the orchestrator drives a saga.
#[derive(Debug, Error)]
pub enum SagaError {
    /// A reply referenced a saga id with no recorded events.
    #[error("unknown saga: {0}")]
    UnknownSaga(SagaId),

    /// The reply payload could not be decoded as a `Reply` envelope.
    #[error("malformed reply on topic {topic}: {reason}")]
    MalformedReply { topic: String, reason: String },

    /// The ingress payload could not be decoded or failed validation.
    #[error("malformed ingress payload: {0}")]
    MalformedIngress(String),

    /// Domain error.
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    /// Event log error.
    #[error("event log error: {0}")]
    EventLog(#[from] EventLogError),

    /// Message bus error.
    #[error("message bus error: {0}")]
    Messaging(#[from] MessagingError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
