//! Strategy runtime errors

use crate::core::error_handling::ContextualError;

/// Failures of a strategy's lifecycle operations
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Strategy '{strategy}' is already running")]
    AlreadyRunning { strategy: String },

    #[error("Strategy '{strategy}' was started before it was configured")]
    NotConfigured { strategy: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ContextualError for RuntimeError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, RuntimeError::AlreadyRunning { .. })
    }

    fn user_message(&self) -> Option<String> {
        if self.is_user_actionable() {
            Some(self.to_string())
        } else {
            None
        }
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
