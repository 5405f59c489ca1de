//! In-process queue
//!
//! Messages are pushed through a [`MemoryQueueHandle`] (or preloaded from the
//! `Messages` option) and consumed in FIFO order. `consume` waits when the
//! queue is empty. Acknowledged and rejected ids are recorded so callers can
//! inspect the outcome of a run.

use crate::config::{parse_options, ConfigResult, Options};
use crate::queue::{Message, Queue, QueueResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct MemoryConfiguration {
    /// Message bodies available right after configuration
    #[serde(default)]
    messages: Vec<String>,
    /// Put rejected messages back at the tail of the queue
    #[serde(default)]
    requeue_rejected: bool,
}

/// Cloneable producer side of a [`MemoryQueue`]
#[derive(Debug, Clone)]
pub struct MemoryQueueHandle {
    sender: mpsc::UnboundedSender<Message>,
    pending: Arc<AtomicUsize>,
    next_id: Arc<AtomicU64>,
}

impl MemoryQueueHandle {
    /// Enqueue a body under a generated sequential id; returns the id
    pub fn push(&self, body: impl Into<String>) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        self.push_message(Message::new(id.clone(), body));
        id
    }

    /// Enqueue a fully formed message
    pub fn push_message(&self, message: Message) {
        self.pending.fetch_add(1, Ordering::AcqRel);
        // The queue owns a receiver for as long as any handle can exist
        if self.sender.send(message).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

pub struct MemoryQueue {
    name: String,
    handle: MemoryQueueHandle,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<Message>>,
    requeue_rejected: bool,
    acked: Mutex<Vec<String>>,
    rejected: Mutex<Vec<String>>,
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            name: name.into(),
            handle: MemoryQueueHandle {
                sender,
                pending: Arc::new(AtomicUsize::new(0)),
                next_id: Arc::new(AtomicU64::new(1)),
            },
            receiver: tokio::sync::Mutex::new(receiver),
            requeue_rejected: false,
            acked: Mutex::new(Vec::new()),
            rejected: Mutex::new(Vec::new()),
        }
    }

    pub fn handle(&self) -> MemoryQueueHandle {
        self.handle.clone()
    }

    /// Convenience for [`MemoryQueueHandle::push`]
    pub fn push(&self, body: impl Into<String>) -> String {
        self.handle.push(body)
    }

    /// Ids acknowledged so far, in acknowledgement order
    pub fn acked_ids(&self) -> Vec<String> {
        snapshot(&self.acked)
    }

    /// Ids rejected so far, in rejection order
    pub fn rejected_ids(&self) -> Vec<String> {
        snapshot(&self.rejected)
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new("Memory")
    }
}

fn snapshot(ids: &Mutex<Vec<String>>) -> Vec<String> {
    // A poisoned list is still a valid record of what happened before the panic
    ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
}

fn record(ids: &Mutex<Vec<String>>, id: &str) {
    ids.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .push(id.to_string());
}

#[async_trait]
impl Queue for MemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, options: &Options) -> ConfigResult<()> {
        let configuration: MemoryConfiguration = parse_options("Memory queue", options)?;
        self.requeue_rejected = configuration.requeue_rejected;
        for body in configuration.messages {
            self.handle.push(body);
        }
        log::info!(
            "Memory queue '{}' configured with {} preloaded messages",
            self.name,
            self.handle.pending.load(Ordering::Acquire)
        );
        Ok(())
    }

    async fn consume(&self) -> QueueResult<Message> {
        let mut receiver = self.receiver.lock().await;
        // recv() only yields None once every sender is gone, and the queue holds one
        match receiver.recv().await {
            Some(message) => {
                self.handle.pending.fetch_sub(1, Ordering::AcqRel);
                log::trace!("Memory queue '{}' delivered {}", self.name, message.id());
                Ok(message)
            }
            None => Err(crate::queue::QueueError::Closed {
                queue: self.name.clone(),
            }),
        }
    }

    async fn ack(&self, message: &Message) -> QueueResult<()> {
        log::debug!("Memory queue '{}' acked {}", self.name, message.id());
        record(&self.acked, message.id());
        Ok(())
    }

    async fn reject(&self, message: &Message) -> QueueResult<()> {
        log::debug!("Memory queue '{}' rejected {}", self.name, message.id());
        record(&self.rejected, message.id());
        if self.requeue_rejected {
            self.handle.push_message(message.clone());
        }
        Ok(())
    }

    async fn number_of_messages(&self) -> QueueResult<Option<usize>> {
        Ok(Some(self.handle.pending.load(Ordering::Acquire)))
    }
}

fn create() -> Box<dyn Queue> {
    Box::new(MemoryQueue::default())
}

crate::register_queue!("Memory", create);
