//! Processor capability contract

use crate::config::{ConfigResult, Options};
use crate::processor::ProcessResult;
use crate::queue::Job;
use async_trait::async_trait;

/// Handles one job at a time; shared by every worker of a strategy
#[async_trait]
pub trait Processor: Send + Sync {
    /// Validate and apply the plugin's options
    fn configure(&mut self, options: &Options) -> ConfigResult<()>;

    /// Process a job.
    ///
    /// Implementations must call exactly one of [`Job::ack`] or
    /// [`Job::reject`] before returning, including when their own work
    /// failed. A returned error is reported to the strategy's error policy.
    async fn process(&self, job: &Job) -> ProcessResult<()>;
}
