//! Queue Error Types

/// Errors surfaced by queue backends and by job disposition.
///
/// These are per-message failures: the pipeline logs them and keeps going.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue '{queue}' failed during {operation}: {message}")]
    OperationFailed {
        queue: String,
        operation: String,
        message: String,
    },

    #[error("Queue '{queue}' does not support {operation}")]
    Unsupported { queue: String, operation: String },

    #[error("Message {message_id} was already {disposition}")]
    AlreadyDisposed {
        message_id: String,
        disposition: String,
    },

    #[error("Queue '{queue}' is closed")]
    Closed { queue: String },

    #[error("Queue I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl QueueError {
    pub fn operation_failed(
        queue: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        QueueError::OperationFailed {
            queue: queue.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;
