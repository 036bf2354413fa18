use baja_core::{InvalidDuration, PlatformError};
use baja_summarizer::SummaryError;
use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A schedule or subscription definition the store refuses to persist.
    #[error("Invalid schedule: {0}")]
    Validation(String),

    #[error("Schedule not found: {id}")]
    NotFound { id: i64 },

    #[error(transparent)]
    InvalidDuration(#[from] InvalidDuration),

    /// Start time not in `HH:MM` form.
    #[error("Invalid time '{0}', expected HH:MM (24-hour)")]
    InvalidTime(String),

    #[error("Unknown timezone '{0}'")]
    InvalidTimezone(String),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Summary error: {0}")]
    Summary(#[from] SummaryError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
