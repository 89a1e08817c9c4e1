//! Sync worker error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Episode {0} does not exist")]
    MissingEpisode(String),

    #[error("Transcript acquisition failed: {0}")]
    Acquisition(String),

    #[error("Transcript was empty after chunking")]
    EmptyTranscript,

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<borrowedbrain_common::errors::AppError> for SyncError {
    fn from(e: borrowedbrain_common::errors::AppError) -> Self {
        use borrowedbrain_common::errors::AppError;
        match e {
            AppError::CatalogError { message } | AppError::TranscriptionError { message } => {
                SyncError::Acquisition(message)
            }
            AppError::EmbeddingError { message } => SyncError::Embedding(message),
            AppError::EmbeddingTimeout { timeout_ms } => {
                SyncError::Embedding(format!("timeout after {}ms", timeout_ms))
            }
            AppError::QueueError { message } => SyncError::Queue(message),
            other => SyncError::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use borrowedbrain_common::errors::AppError;

    #[test]
    fn test_gateway_errors_map_to_acquisition() {
        let err: SyncError = AppError::TranscriptionError {
            message: "audio 404".to_string(),
        }
        .into();
        assert!(matches!(err, SyncError::Acquisition(_)));

        let err: SyncError = AppError::CatalogError {
            message: "rate limited".to_string(),
        }
        .into();
        assert!(matches!(err, SyncError::Acquisition(_)));
    }

    #[test]
    fn test_embedding_errors_map_to_embedding() {
        let err: SyncError = AppError::EmbeddingError {
            message: "503".to_string(),
        }
        .into();
        assert!(matches!(err, SyncError::Embedding(_)));
    }
}
