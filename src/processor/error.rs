//! Processor Error Types

use crate::queue::QueueError;

/// Per-job processing failures.
///
/// What happens next is decided by the strategy's `OnProcessingError` policy.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Error during message serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Error on message disposition: {0}")]
    Disposition(#[from] QueueError),

    #[error("Processor '{processor}' failed: {message}")]
    Failed { processor: String, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessError {
    pub fn failed(processor: impl Into<String>, message: impl Into<String>) -> Self {
        ProcessError::Failed {
            processor: processor.into(),
            message: message.into(),
        }
    }
}

/// Result type for processor operations
pub type ProcessResult<T> = Result<T, ProcessError>;
