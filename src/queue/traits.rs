//! Queue capability contract

use crate::config::{ConfigResult, Options};
use crate::queue::{Message, QueueResult};
use async_trait::async_trait;

/// A source of messages with acknowledge/reject semantics
///
/// Implementations are configured once during load (`&mut self`) and are
/// then shared read-only between the fetch loop and every job that
/// originated from them, so the runtime methods take `&self`.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Human readable backend name
    fn name(&self) -> &str;

    /// Validate and apply the plugin's options
    fn configure(&mut self, options: &Options) -> ConfigResult<()>;

    /// Receive the next message.
    ///
    /// May wait indefinitely; this is the backpressure point of the whole
    /// pipeline. The fetch loop drops the returned future when it is asked to
    /// stop, so implementations must be cancel-safe or accept that a message
    /// received by a cancelled call is redelivered by the backend.
    async fn consume(&self) -> QueueResult<Message>;

    /// Mark a message as successfully processed
    async fn ack(&self, message: &Message) -> QueueResult<()>;

    /// Hand a message back to the backend. Backends without a reject
    /// operation return [`QueueError::Unsupported`](crate::queue::QueueError).
    async fn reject(&self, message: &Message) -> QueueResult<()>;

    /// Approximate number of messages waiting, when the backend knows it
    async fn number_of_messages(&self) -> QueueResult<Option<usize>>;
}
