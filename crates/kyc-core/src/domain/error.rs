//! Domain-level error taxonomy for KYC Verify.
//!
//! Negative verification outcomes (no face, no motion, high risk) are not
//! errors; they come back as `Ok` results. Everything here is scoped to a
//! single request and nothing is retried.

use kyc_state::{SessionId, StorageError};

/// KYC Verify domain errors.
#[derive(Debug, thiserror::Error)]
pub enum KycError {
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("session already completed: {0}")]
    SessionCompleted(SessionId),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl KycError {
    /// Stable snake_case label, used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => "not_found",
            Self::SessionCompleted(_) => "session_completed",
            Self::Decode(_) => "decode_error",
            Self::EngineUnavailable(_) => "engine_unavailable",
            Self::Validation(_) => "validation_error",
            Self::Config(_) => "config_error",
            Self::Storage(_) => "storage_error",
            Self::Serialization(_) => "serialization_error",
            Self::Io(_) => "io_error",
        }
    }
}

impl From<StorageError> for KycError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::SessionNotFound { session_id } => {
                KycError::SessionNotFound(SessionId(session_id))
            }
            // A domain error raised inside a store mutation comes back as is.
            StorageError::Rejected(inner) => match inner.downcast::<KycError>() {
                Ok(err) => *err,
                Err(inner) => KycError::Storage(StorageError::Rejected(inner)),
            },
            other => KycError::Storage(other),
        }
    }
}

impl From<image::ImageError> for KycError {
    fn from(err: image::ImageError) -> Self {
        KycError::Decode(err.to_string())
    }
}

/// Result type for KYC Verify domain operations.
pub type Result<T> = std::result::Result<T, KycError>;
