//! Synchronization utilities for robust mutex handling
//!
//! Lock poisoning means a task panicked while holding the lock. The engine
//! surfaces that as an ordinary error of the calling module instead of
//! propagating the panic into the dispatcher or the worker pool.

use std::sync::LockResult;

/// Convert a poisoned lock result into a module error
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use qp::core::sync::handle_mutex_poison;
/// use qp::strategy::RuntimeError;
///
/// let mutex = Mutex::new(42);
/// let guard = handle_mutex_poison(mutex.lock(), |message| RuntimeError::Internal { message })
///     .unwrap();
/// assert_eq!(*guard, 42);
/// ```
pub fn handle_mutex_poison<T, E>(
    result: LockResult<T>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<T, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "Internal synchronisation error (mutex poisoned). A task panicked while holding a lock: {:?}",
            poison_err
        ))
    })
}
