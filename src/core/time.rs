//! Time provider abstraction for testable time-dependent logic

#[cfg(test)]
use std::sync::{Arc, Mutex};
#[cfg(test)]
use std::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

/// Abstraction over the wall clock so throttling can be tested without
/// sleeping through real seconds
pub trait TimeProvider: Send + Sync {
    /// Get the current wall-clock time (for timestamps and calendar seconds)
    fn system_time(&self) -> SystemTime;

    /// Whole seconds since the Unix epoch.
    ///
    /// A clock set before 1970 reads as second zero.
    fn epoch_second(&self) -> u64 {
        self.system_time()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Production time provider using actual system time
#[derive(Debug, Default, Clone)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Mock time provider for deterministic testing
#[derive(Clone)]
#[cfg(test)]
pub struct MockTimeProvider {
    current_system_time: Arc<Mutex<SystemTime>>,
}

#[cfg(test)]
impl MockTimeProvider {
    /// Create a mock clock pinned to the start of a whole epoch second
    pub fn new() -> Self {
        Self::at_epoch_second(1_700_000_000)
    }

    pub fn at_epoch_second(second: u64) -> Self {
        Self {
            current_system_time: Arc::new(Mutex::new(UNIX_EPOCH + Duration::from_secs(second))),
        }
    }

    /// Move the clock forward by the given duration
    pub fn advance_time(&self, duration: Duration) {
        *self.current_system_time.lock().unwrap() += duration;
    }
}

#[cfg(test)]
impl TimeProvider for MockTimeProvider {
    fn system_time(&self) -> SystemTime {
        *self.current_system_time.lock().unwrap()
    }
}
