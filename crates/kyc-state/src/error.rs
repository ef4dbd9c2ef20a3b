//! Error types for kyc-state

use thiserror::Error;

/// Errors that can occur in the session persistence layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// No session stored under this id
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// `create` called with an id that is already stored
    #[error("session already exists: {session_id}")]
    SessionExists { session_id: String },

    /// Stored record could not be encoded or decoded
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The mutation passed to `update_with` declined to apply; nothing was
    /// written
    #[error("update rejected: {0}")]
    Rejected(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StorageError {
    pub fn not_found(session_id: &crate::SessionId) -> Self {
        StorageError::SessionNotFound {
            session_id: session_id.to_string(),
        }
    }

    /// Wrap a caller's error so it can be returned from a mutation.
    pub fn rejected(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        StorageError::Rejected(Box::new(err))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::SessionNotFound { .. })
    }
}
