//! Queue capability, messages and jobs
//!
//! A [`Queue`] produces [`Message`]s; the strategy wraps each one in a
//! [`Job`] bound to its queue, so a processor can acknowledge or reject the
//! message without knowing which backend it came from.
//!
//! ```text
//!  Queue::consume() ──► Message ──► Job { queue, message } ──► Processor::process(&job)
//!        ▲                                                          │
//!        └──────────────── Job::ack() / Job::reject() ◄─────────────┘
//! ```

pub mod builtin;
mod error;
mod job;
mod message;
mod traits;

pub use error::{QueueError, QueueResult};
pub use job::{Disposition, Job};
pub use message::Message;
pub use traits::Queue;
