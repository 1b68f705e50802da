use thiserror::Error;

/// Errors returned by an [`crate::store::EventLogStore`] implementation.
#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("saga {0} has no recorded events")]
    SagaNotFound(common::SagaId),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EventLogError>;
