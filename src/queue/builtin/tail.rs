//! Tail queue: follows a file and treats each line as a message.
//!
//! The file is opened lazily on the first `consume`, read from the start and
//! then polled for appended lines. A file that shrinks (rotation by
//! truncation) is re-read from the beginning. Lines are delivered as soon as
//! the reader reaches them, so writers should append whole lines.

use crate::config::{parse_options, ConfigError, ConfigResult, Options};
use crate::queue::{Message, Queue, QueueError, QueueResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader, Lines};
use tokio::sync::Mutex;

const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct TailConfiguration {
    path: PathBuf,
    #[serde(default = "TailConfiguration::default_poll_interval")]
    poll_interval: u64,
}

impl TailConfiguration {
    fn default_poll_interval() -> u64 {
        DEFAULT_POLL_INTERVAL_MS
    }
}

struct TailState {
    lines: Lines<BufReader<File>>,
    position: u64,
}

#[derive(Default)]
pub struct TailQueue {
    path: PathBuf,
    poll_interval: Duration,
    state: Mutex<Option<TailState>>,
}

impl TailQueue {
    pub fn new() -> Self {
        Self::default()
    }

    async fn open(&self) -> QueueResult<TailState> {
        let file = File::open(&self.path).await.map_err(|e| {
            QueueError::operation_failed(
                "Tail",
                "open",
                format!("failed to tail file {}: {}", self.path.display(), e),
            )
        })?;
        log::info!("Tail queue started tailing {}", self.path.display());
        Ok(TailState {
            lines: BufReader::new(file).lines(),
            position: 0,
        })
    }

    /// Detect truncation by comparing the file length with what was read
    async fn truncated(&self, state: &mut TailState) -> QueueResult<bool> {
        let length = tokio::fs::metadata(&self.path).await?.len();
        if length < state.position {
            return Ok(true);
        }
        state.position = state.lines.get_mut().stream_position().await?;
        Ok(false)
    }
}

#[async_trait]
impl Queue for TailQueue {
    fn name(&self) -> &str {
        "Tail"
    }

    fn configure(&mut self, options: &Options) -> ConfigResult<()> {
        let configuration: TailConfiguration = parse_options("Tail queue", options)?;
        if configuration.poll_interval == 0 {
            return Err(ConfigError::invalid_options(
                "Tail queue",
                "PollInterval should be > 0",
            ));
        }
        self.path = configuration.path;
        self.poll_interval = Duration::from_millis(configuration.poll_interval);
        log::info!("Tail queue configured for {}", self.path.display());
        Ok(())
    }

    async fn consume(&self) -> QueueResult<Message> {
        let mut guard = self.state.lock().await;
        loop {
            if guard.is_none() {
                *guard = Some(self.open().await?);
            }
            let Some(state) = guard.as_mut() else {
                continue;
            };

            // next_line is cancel safe, so a stop request never loses a line
            if let Some(line) = state.lines.next_line().await? {
                return Ok(Message::new(chrono::Utc::now().to_rfc3339(), line));
            }

            if self.truncated(state).await? {
                log::info!("Tail queue detected truncation of {}", self.path.display());
                *guard = None;
                continue;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn ack(&self, message: &Message) -> QueueResult<()> {
        log::debug!("Tail queue acknowledged line read at {}", message.id());
        Ok(())
    }

    async fn reject(&self, message: &Message) -> QueueResult<()> {
        log::debug!("Tail queue asked to reject line read at {}", message.id());
        Err(QueueError::Unsupported {
            queue: "Tail".to_string(),
            operation: "reject".to_string(),
        })
    }

    async fn number_of_messages(&self) -> QueueResult<Option<usize>> {
        Ok(None)
    }
}

fn create() -> Box<dyn Queue> {
    Box::new(TailQueue::new())
}

crate::register_queue!("Tail", create);
