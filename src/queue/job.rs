//! Job: a consumed message bound to the queue that produced it

use crate::queue::{Message, Queue, QueueError, QueueResult};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use strum_macros::{Display, FromRepr};

/// Outcome of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum Disposition {
    Pending = 0,
    Acked = 1,
    Rejected = 2,
}

/// A message plus ack/reject capability
///
/// Processors receive a `&Job` and must call exactly one of [`Job::ack`] or
/// [`Job::reject`]. The first call claims the job; any later call fails with
/// [`QueueError::AlreadyDisposed`] without reaching the backend.
///
/// The claim and the outcome are tracked apart: [`Job::disposition`] only
/// changes once the backend has accepted the ack or reject.
pub struct Job {
    queue: Arc<dyn Queue>,
    message: Message,
    requested: AtomicU8,
    disposition: AtomicU8,
}

impl Job {
    pub fn new(queue: Arc<dyn Queue>, message: Message) -> Self {
        Self {
            queue,
            message,
            requested: AtomicU8::new(Disposition::Pending as u8),
            disposition: AtomicU8::new(Disposition::Pending as u8),
        }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Name of the queue the message came from
    pub fn queue_name(&self) -> &str {
        self.queue.name()
    }

    /// What the backend confirmed; `Pending` until an ack or reject succeeds
    pub fn disposition(&self) -> Disposition {
        load(&self.disposition)
    }

    /// What the processor asked for, whether or not the backend accepted it
    pub fn requested(&self) -> Disposition {
        load(&self.requested)
    }

    /// Acknowledge the message on its queue
    pub async fn ack(&self) -> QueueResult<()> {
        self.settle(Disposition::Acked).await
    }

    /// Reject the message on its queue
    pub async fn reject(&self) -> QueueResult<()> {
        self.settle(Disposition::Rejected).await
    }

    async fn settle(&self, target: Disposition) -> QueueResult<()> {
        self.claim(target)?;
        match target {
            Disposition::Acked => self.queue.ack(&self.message).await?,
            Disposition::Rejected => self.queue.reject(&self.message).await?,
            Disposition::Pending => return Ok(()),
        }
        self.disposition.store(target as u8, Ordering::Release);
        Ok(())
    }

    fn claim(&self, target: Disposition) -> QueueResult<()> {
        self.requested
            .compare_exchange(
                Disposition::Pending as u8,
                target as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|current| QueueError::AlreadyDisposed {
                message_id: self.message.id().to_string(),
                disposition: Disposition::from_repr(current)
                    .unwrap_or(Disposition::Pending)
                    .to_string(),
            })
    }
}

fn load(cell: &AtomicU8) -> Disposition {
    Disposition::from_repr(cell.load(Ordering::Acquire)).unwrap_or(Disposition::Pending)
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("queue", &self.queue.name())
            .field("message", &self.message)
            .field("requested", &self.requested())
            .field("disposition", &self.disposition())
            .finish()
    }
}
