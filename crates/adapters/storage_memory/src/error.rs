//! Storage-specific error type.

use entigate_domain::error::GatewayError;

/// Errors originating from the in-memory storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Failed to (de)serialize a snapshot.
    #[error("JSON snapshot error")]
    Json(#[from] serde_json::Error),
}

impl From<StorageError> for GatewayError {
    fn from(err: StorageError) -> Self {
        Self::Collaborator(Box::new(err))
    }
}
