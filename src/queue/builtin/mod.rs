//! Built-in queue backends

mod dummy;
mod memory;
mod sqs;
mod tail;

pub use dummy::DummyQueue;
pub use memory::{MemoryQueue, MemoryQueueHandle};
pub use sqs::SqsQueue;
pub use tail::TailQueue;
