use thiserror::Error;

#[derive(Debug, Error)]
pub enum BajaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid duration: {0}")]
    InvalidDuration(#[from] crate::duration::InvalidDuration),

    #[error("Platform error: {0}")]
    Platform(#[from] crate::platform::PlatformError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BajaError {
    /// Short error code string, used in logs and the health payload.
    pub fn code(&self) -> &'static str {
        match self {
            BajaError::Config(_) => "CONFIG_ERROR",
            BajaError::Database(_) => "DATABASE_ERROR",
            BajaError::InvalidDuration(_) => "INVALID_DURATION",
            BajaError::Platform(_) => "PLATFORM_ERROR",
            BajaError::Serialization(_) => "SERIALIZATION_ERROR",
            BajaError::Io(_) => "IO_ERROR",
            BajaError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, BajaError>;
