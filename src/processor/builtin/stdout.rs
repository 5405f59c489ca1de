//! Stdout processor: prints every message and acknowledges it

use crate::config::{parse_options, ConfigResult, Options};
use crate::processor::{Processor, ProcessResult};
use crate::queue::Job;
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StdoutConfiguration {}

#[derive(Debug, Default)]
pub struct StdoutProcessor;

#[async_trait]
impl Processor for StdoutProcessor {
    fn configure(&mut self, options: &Options) -> ConfigResult<()> {
        let _: StdoutConfiguration = parse_options("Stdout processor", options)?;
        Ok(())
    }

    async fn process(&self, job: &Job) -> ProcessResult<()> {
        println!("[Stdout processor] Received message: {:?}", job.message());
        job.ack().await?;
        Ok(())
    }
}

fn create() -> Box<dyn Processor> {
    Box::new(StdoutProcessor)
}

crate::register_processor!("Stdout", create);
