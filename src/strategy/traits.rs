//! Strategy capability contract

use crate::config::{ConfigResult, Options};
use crate::core::context::Context;
use crate::strategy::{RuntimeResult, Statistics};
use async_trait::async_trait;

/// Drives a queue into a processor
///
/// `start` blocks for the whole run and returns once the pipeline has fully
/// drained, whether because `stop` was called or because the pipeline ended
/// on its own. `stop` on a strategy that is not running is a no-op.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Validate options and resolve the queue and processor they reference
    fn configure(&mut self, name: &str, options: &Options, context: &Context) -> ConfigResult<()>;

    /// Run the pipeline until it is stopped or ends by itself.
    ///
    /// The run must be registered before the first suspension point, so a
    /// `stop` issued once the returned future has been polled finds it.
    async fn start(&self) -> RuntimeResult<()>;

    /// Request a stop and wait until in-flight jobs have finished
    async fn stop(&self) -> RuntimeResult<()>;

    /// Snapshot of counters and state
    async fn statistics(&self) -> Statistics;
}
