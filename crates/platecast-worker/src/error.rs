//! Worker error types.

use platecast_models::{CreditExhausted, RecipeError};
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Provider error: {0}")]
    Provider(#[from] platecast_provider::ProviderError),

    #[error("Generation task {task_id} failed: {reason}")]
    TaskFailed { task_id: String, reason: String },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Quality check failed: {0}")]
    Quality(String),

    #[error("{0}")]
    CreditExhausted(#[from] CreditExhausted),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Recipe error: {0}")]
    Recipe(#[from] RecipeError),

    #[error("Storage error: {0}")]
    Storage(#[from] platecast_storage::StorageError),

    #[error("Firestore error: {0}")]
    Firestore(#[from] platecast_firestore::FirestoreError),
}

impl WorkerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn task_failed(task_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TaskFailed {
            task_id: task_id.into(),
            reason: reason.into(),
        }
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Provider(e) => e.is_retryable(),
            WorkerError::Storage(e) => e.is_retryable(),
            WorkerError::Firestore(e) => e.is_retryable(),
            WorkerError::TaskFailed { .. }
            | WorkerError::Timeout(_)
            | WorkerError::DownloadFailed(_) => true,
            _ => false,
        }
    }

    /// Caller supplied something that can never succeed.
    pub fn is_validation(&self) -> bool {
        match self {
            WorkerError::Validation(_) | WorkerError::Recipe(_) => true,
            WorkerError::Provider(e) => e.is_validation(),
            _ => false,
        }
    }
}
