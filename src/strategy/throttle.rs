//! Per-second fetch throttle
//!
//! Limits how many fetches may start within one calendar second of the
//! clock. When the budget is spent the caller spins on short sleeps until
//! the second rolls over.

use crate::core::time::TimeProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Sleep between budget checks while throttled
pub const THROTTLE_POLL_INTERVAL: Duration = Duration::from_millis(1);

pub struct Throttle {
    limit: u64,
    clock: Arc<dyn TimeProvider>,
    current_second: u64,
    started: u64,
}

impl Throttle {
    /// `limit` fetches per second; callers use no throttle at all for zero
    pub fn new(limit: u64, clock: Arc<dyn TimeProvider>) -> Self {
        let current_second = clock.epoch_second();
        Self {
            limit,
            clock,
            current_second,
            started: 0,
        }
    }

    /// Take a slot in the current second if one is left
    pub fn try_acquire(&mut self) -> bool {
        let now = self.clock.epoch_second();
        if now != self.current_second {
            self.current_second = now;
            self.started = 0;
        }
        if self.started < self.limit {
            self.started += 1;
            true
        } else {
            false
        }
    }

    /// Wait for a slot. Returns `false` if a stop was requested meanwhile.
    pub async fn acquire(&mut self, stop: &watch::Receiver<bool>) -> bool {
        loop {
            if *stop.borrow() {
                return false;
            }
            if self.try_acquire() {
                return true;
            }
            tokio::time::sleep(THROTTLE_POLL_INTERVAL).await;
        }
    }
}
