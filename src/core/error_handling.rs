//! Generic error handling utilities
//!
//! Provides unified fatal-error logging across the engine's error types
//! while keeping the detail level appropriate for each kind of failure.

/// Trait for errors that can distinguish between user-actionable and system errors
///
/// When `is_user_actionable()` returns `true`, `user_message()` must return
/// `Some(message)`; otherwise it returns `None`.
pub trait ContextualError: std::error::Error {
    /// Returns true if this error carries a specific message the operator can
    /// act on directly (bad option, unknown plugin type, wrong strategy count)
    fn is_user_actionable(&self) -> bool;

    /// The message to show the operator when the error is user-actionable
    fn user_message(&self) -> Option<String>;
}

/// Log a fatal error with a detail level based on its specificity
///
/// User-actionable errors print their own message; system errors print the
/// operation context and leave the details to debug level.
pub fn log_error_with_context<E: ContextualError + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => {
            log::error!("FATAL: {}: {}", operation_context, user_msg);
        }
        _ => log::error!("FATAL: {}", operation_context),
    }
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}

/// Text shown on stderr for a fatal error, before logging may be available
pub fn fatal_message<E: ContextualError>(error: &E, operation_context: &str) -> String {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => user_msg,
        _ => format!("{}: {}", operation_context, error),
    }
}
