//! Dummy queue: generates static messages after a random delay.
//! Used for debugging wiring without a real backend.

use crate::config::{parse_options, ConfigError, ConfigResult, Options};
use crate::queue::{Message, Queue, QueueResult};
use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct DummyConfiguration {
    /// Upper bound of the random delay before each message, in milliseconds
    #[serde(default)]
    random_sleep_delay: i64,
}

#[derive(Debug, Default)]
pub struct DummyQueue {
    max_delay: Duration,
    generated: AtomicU64,
}

impl DummyQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Queue for DummyQueue {
    fn name(&self) -> &str {
        "Dummy queue"
    }

    fn configure(&mut self, options: &Options) -> ConfigResult<()> {
        let configuration: DummyConfiguration = parse_options("Dummy queue", options)?;
        if configuration.random_sleep_delay < 0 {
            return Err(ConfigError::invalid_options(
                "Dummy queue",
                "RandomSleepDelay should be >= 0",
            ));
        }
        self.max_delay = Duration::from_millis(configuration.random_sleep_delay as u64);
        log::info!("Dummy queue configured, max delay {:?}", self.max_delay);
        Ok(())
    }

    async fn consume(&self) -> QueueResult<Message> {
        if !self.max_delay.is_zero() {
            let max_millis = self.max_delay.as_millis() as u64;
            let delay = Duration::from_millis(rand::thread_rng().gen_range(0..=max_millis));
            tokio::time::sleep(delay).await;
        }
        let sequence = self.generated.fetch_add(1, Ordering::Relaxed) + 1;
        let now = chrono::Utc::now();
        log::debug!("Dummy queue generated message {}", sequence);
        Ok(Message::new(
            format!("{}-{}", now.timestamp_nanos_opt().unwrap_or_default(), sequence),
            format!("Dummy message generated | break at {}", now.to_rfc3339()),
        ))
    }

    async fn ack(&self, message: &Message) -> QueueResult<()> {
        log::debug!("Dummy queue acknowledged {}", message.id());
        Ok(())
    }

    async fn reject(&self, message: &Message) -> QueueResult<()> {
        log::debug!("Dummy queue rejected {}", message.id());
        Ok(())
    }

    async fn number_of_messages(&self) -> QueueResult<Option<usize>> {
        Ok(None)
    }
}

fn create() -> Box<dyn Queue> {
    Box::new(DummyQueue::new())
}

crate::register_queue!("Dummy", create);

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generates_distinct_messages_without_delay() {
        let mut queue = DummyQueue::new();
        queue.configure(&Options::new()).unwrap();

        let first = queue.consume().await.unwrap();
        let second = queue.consume().await.unwrap();

        assert_ne!(first.id(), second.id());
        assert!(first.body().starts_with("Dummy message generated"));
        assert_eq!(queue.number_of_messages().await.unwrap(), None);
    }

    #[test]
    fn test_negative_delay_rejected() {
        let mut queue = DummyQueue::new();
        let options: Options = toml::from_str("RandomSleepDelay = -5").unwrap();
        assert!(matches!(
            queue.configure(&options),
            Err(ConfigError::InvalidOptions { .. })
        ));
    }
}
