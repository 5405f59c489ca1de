//! Sqs queue: long-polls an AWS SQS queue.
//!
//! Credentials come from the named profile in the shared AWS config files.
//! The client and the queue URL are resolved on first use, because loading
//! the AWS configuration is asynchronous and `configure` is not.
//!
//! A message id is its receipt handle, so acking deletes the message by that
//! handle. Rejecting does nothing: an unacked message becomes visible again
//! once its visibility timeout expires, and the queue's redrive policy takes
//! it from there.

use crate::config::{parse_options, ConfigError, ConfigResult, Options};
use crate::queue::{Message, Queue, QueueError, QueueResult};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::QueueAttributeName;
use aws_sdk_sqs::Client;
use serde::Deserialize;
use tokio::sync::OnceCell;

const DEFAULT_WAIT_TIME_SECONDS: i32 = 20;
/// Longest long-poll SQS accepts
const MAX_WAIT_TIME_SECONDS: i32 = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct SqsConfiguration {
    queue_name: String,
    #[serde(default = "SqsConfiguration::default_wait_time_seconds")]
    wait_time_seconds: i32,
    #[serde(default)]
    aws_region: String,
    #[serde(default)]
    aws_profile: String,
}

impl SqsConfiguration {
    fn default_wait_time_seconds() -> i32 {
        DEFAULT_WAIT_TIME_SECONDS
    }
}

struct Connection {
    client: Client,
    queue_url: String,
}

#[derive(Default)]
pub struct SqsQueue {
    configuration: Option<SqsConfiguration>,
    connection: OnceCell<Connection>,
}

impl SqsQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wait_time_seconds(&self) -> Option<i32> {
        self.configuration.as_ref().map(|c| c.wait_time_seconds)
    }

    async fn connection(&self) -> QueueResult<&Connection> {
        let configuration = self.configuration.as_ref().ok_or_else(|| {
            QueueError::operation_failed("Sqs", "connect", "queue used before configure")
        })?;
        self.connection
            .get_or_try_init(|| connect(configuration))
            .await
    }
}

async fn connect(configuration: &SqsConfiguration) -> QueueResult<Connection> {
    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .profile_name(&configuration.aws_profile)
        .region(Region::new(configuration.aws_region.clone()))
        .load()
        .await;
    let client = Client::new(&sdk_config);

    let response = client
        .get_queue_url()
        .queue_name(&configuration.queue_name)
        .send()
        .await
        .map_err(|e| failure("GetQueueUrl", e))?;
    let queue_url = response
        .queue_url()
        .ok_or_else(|| {
            QueueError::operation_failed("Sqs", "GetQueueUrl", "response carried no queue URL")
        })?
        .to_string();

    log::info!(
        "Sqs queue connected to {} (region {}, profile {})",
        queue_url,
        configuration.aws_region,
        configuration.aws_profile
    );
    Ok(Connection { client, queue_url })
}

fn failure<E>(operation: &str, error: E) -> QueueError
where
    E: std::error::Error,
{
    QueueError::operation_failed("Sqs", operation, DisplayErrorContext(error).to_string())
}

#[async_trait]
impl Queue for SqsQueue {
    fn name(&self) -> &str {
        "Sqs"
    }

    fn configure(&mut self, options: &Options) -> ConfigResult<()> {
        let configuration: SqsConfiguration = parse_options("Sqs queue", options)?;

        if configuration.aws_profile.is_empty() {
            return Err(ConfigError::invalid_options(
                "Sqs queue",
                "You need to provide AwsProfile for Sqs queue",
            ));
        }
        if configuration.aws_region.is_empty() {
            return Err(ConfigError::invalid_options(
                "Sqs queue",
                "You need to provide AwsRegion for Sqs queue",
            ));
        }
        if configuration.queue_name.is_empty() {
            return Err(ConfigError::invalid_options(
                "Sqs queue",
                "QueueName should not be empty",
            ));
        }
        if !(0..=MAX_WAIT_TIME_SECONDS).contains(&configuration.wait_time_seconds) {
            return Err(ConfigError::invalid_options(
                "Sqs queue",
                format!(
                    "WaitTimeSeconds should be between 0 and {}, got {}",
                    MAX_WAIT_TIME_SECONDS, configuration.wait_time_seconds
                ),
            ));
        }

        log::info!(
            "Sqs queue configured: queue {}, wait {}s",
            configuration.queue_name,
            configuration.wait_time_seconds
        );
        self.configuration = Some(configuration);
        self.connection = OnceCell::new();
        Ok(())
    }

    async fn consume(&self) -> QueueResult<Message> {
        let connection = self.connection().await?;
        let wait = self.wait_time_seconds().unwrap_or(DEFAULT_WAIT_TIME_SECONDS);
        loop {
            let response = connection
                .client
                .receive_message()
                .queue_url(&connection.queue_url)
                .max_number_of_messages(1)
                .wait_time_seconds(wait)
                .send()
                .await
                .map_err(|e| failure("ReceiveMessage", e))?;

            let Some(received) = response.messages().first() else {
                log::trace!("Sqs long poll returned nothing; polling again");
                continue;
            };
            let Some(receipt_handle) = received.receipt_handle() else {
                log::warn!(
                    "Sqs message {:?} has no receipt handle; skipped",
                    received.message_id()
                );
                continue;
            };
            return Ok(
                Message::new(receipt_handle, received.body().unwrap_or_default())
                    .with_raw(format!("{:?}", received)),
            );
        }
    }

    async fn ack(&self, message: &Message) -> QueueResult<()> {
        let connection = self.connection().await?;
        connection
            .client
            .delete_message()
            .queue_url(&connection.queue_url)
            .receipt_handle(message.id())
            .send()
            .await
            .map_err(|e| failure("DeleteMessage", e))?;
        log::debug!("Sqs message deleted");
        Ok(())
    }

    async fn reject(&self, _message: &Message) -> QueueResult<()> {
        log::debug!("Sqs message left for redelivery");
        Ok(())
    }

    async fn number_of_messages(&self) -> QueueResult<Option<usize>> {
        let connection = self.connection().await?;
        let response = connection
            .client
            .get_queue_attributes()
            .queue_url(&connection.queue_url)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
            .send()
            .await
            .map_err(|e| failure("GetQueueAttributes", e))?;

        Ok(response
            .attributes()
            .and_then(|attributes| attributes.get(&QueueAttributeName::ApproximateNumberOfMessages))
            .and_then(|count| count.parse().ok()))
    }
}

fn create() -> Box<dyn Queue> {
    Box::new(SqsQueue::new())
}

crate::register_queue!("Sqs", create);
