//! Plugin registration and discovery
//!
//! Queue, processor and strategy implementations register a factory under
//! their type name with the `register_queue!`, `register_processor!` and
//! `register_strategy!` macros. The factories are collected at link time with
//! `inventory` and looked up by the loader through a [`PluginRegistry`].

mod registry;

pub use registry::{
    PluginRegistry, ProcessorFactory, ProcessorFactoryEntry, QueueFactory, QueueFactoryEntry,
    StrategyFactory, StrategyFactoryEntry,
};

use strum_macros::Display;

/// The three polymorphism points of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum PluginKind {
    Queue,
    Processor,
    Strategy,
}

/// Register a queue type for discovery
///
/// ```rust,ignore
/// fn create() -> Box<dyn qp::queue::Queue> {
///     Box::new(MyQueue::default())
/// }
/// qp::register_queue!("MyQueue", create);
/// ```
#[macro_export]
macro_rules! register_queue {
    ($type_name:expr, $factory:path) => {
        inventory::submit! {
            $crate::plugin::QueueFactoryEntry {
                type_name: $type_name,
                factory: $factory,
            }
        }
    };
}

/// Register a processor type for discovery
#[macro_export]
macro_rules! register_processor {
    ($type_name:expr, $factory:path) => {
        inventory::submit! {
            $crate::plugin::ProcessorFactoryEntry {
                type_name: $type_name,
                factory: $factory,
            }
        }
    };
}

/// Register a strategy type for discovery
#[macro_export]
macro_rules! register_strategy {
    ($type_name:expr, $factory:path) => {
        inventory::submit! {
            $crate::plugin::StrategyFactoryEntry {
                type_name: $type_name,
                factory: $factory,
            }
        }
    };
}
