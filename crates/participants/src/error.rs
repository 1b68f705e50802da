use thiserror::Error;

/// Errors a participant store can raise. Only [`ParticipantError::Database`]
/// is an infrastructure failure; handlers must not acknowledge the
/// triggering command when they see one.
#[derive(Debug, Error)]
pub enum ParticipantError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type Result<T> = std::result::Result<T, ParticipantError>;
