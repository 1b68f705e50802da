//! Domain error types.

use event_store::EventLogError;
use thiserror::Error;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the event log store.
    #[error("event log error: {0}")]
    EventLog(#[from] EventLogError),

    /// The ingress or reply payload failed validation.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// No saga exists for the given id.
    #[error("saga not found: {0}")]
    SagaNotFound(common::SagaId),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DomainError>;
