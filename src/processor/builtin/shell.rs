//! Shell processor: runs a shell command per message.
//!
//! Exit status 0 acknowledges the message, anything else rejects it. A
//! rejected message is a normal outcome, not a processing error; only a
//! failure to run the command or to dispose of the message is an error.

use crate::config::{parse_options, ConfigError, ConfigResult, Options};
use crate::processor::{ProcessError, ProcessResult, Processor};
use crate::queue::Job;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

const DEFAULT_PLACEHOLDER: &str = "%msg%";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct ShellConfiguration {
    command: String,
    #[serde(default = "ShellConfiguration::default_placeholder")]
    message_placeholder: String,
    #[serde(default)]
    echo_output: bool,
    /// Substitute the backend's raw form instead of the JSON message
    #[serde(default)]
    send_raw: bool,
    /// Single-quote the substituted message for the shell
    #[serde(default = "ShellConfiguration::default_quote")]
    quote_message: bool,
}

impl ShellConfiguration {
    fn default_placeholder() -> String {
        DEFAULT_PLACEHOLDER.to_string()
    }

    fn default_quote() -> bool {
        true
    }
}

#[derive(Debug, Default)]
pub struct ShellProcessor {
    configuration: Option<ShellConfiguration>,
}

impl ShellProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    fn command_line(configuration: &ShellConfiguration, job: &Job) -> ProcessResult<String> {
        let message = job.message();
        let payload = if configuration.send_raw {
            message.raw().unwrap_or_default().to_string()
        } else {
            message.to_json()?
        };
        let payload = if configuration.quote_message {
            shell_quote(&payload)
        } else {
            payload
        };
        Ok(configuration
            .command
            .replace(&configuration.message_placeholder, &payload))
    }
}

/// Wrap a value in single quotes, escaping embedded single quotes
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[async_trait]
impl Processor for ShellProcessor {
    fn configure(&mut self, options: &Options) -> ConfigResult<()> {
        let configuration: ShellConfiguration = parse_options("Shell processor", options)?;
        if configuration.message_placeholder.is_empty() {
            return Err(ConfigError::invalid_options(
                "Shell processor",
                "MessagePlaceholder should not be empty",
            ));
        }
        log::info!(
            "Shell processor configured: command {:?}, placeholder {:?}",
            configuration.command,
            configuration.message_placeholder
        );
        self.configuration = Some(configuration);
        Ok(())
    }

    async fn process(&self, job: &Job) -> ProcessResult<()> {
        let configuration = self
            .configuration
            .as_ref()
            .ok_or_else(|| ProcessError::failed("Shell", "processor used before configure"))?;

        let command_line = match Self::command_line(configuration, job) {
            Ok(line) => line,
            Err(e) => {
                job.reject().await?;
                return Err(e);
            }
        };
        log::debug!("Shell processor executing: {}", command_line);

        let output = match Command::new("bash").arg("-c").arg(&command_line).output().await {
            Ok(output) => output,
            Err(e) => {
                job.reject().await?;
                return Err(e.into());
            }
        };

        if configuration.echo_output {
            println!("{}", String::from_utf8_lossy(&output.stdout));
        }

        if output.status.success() {
            job.ack().await?;
            log::debug!("Shell processor acknowledged {}", job.message().id());
        } else {
            job.reject().await?;
            log::debug!(
                "Shell processor rejected {} ({})",
                job.message().id(),
                output.status
            );
        }
        Ok(())
    }
}

fn create() -> Box<dyn Processor> {
    Box::new(ShellProcessor::new())
}

crate::register_processor!("Shell", create);
