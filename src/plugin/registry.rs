//! Plugin Registry
//!
//! Maps plugin type names to factories. The registry is built once before
//! loading and only read afterwards.

use crate::config::{ConfigError, ConfigResult};
use crate::plugin::PluginKind;
use crate::processor::Processor;
use crate::queue::Queue;
use crate::strategy::Strategy;
use std::collections::HashMap;
use std::sync::Arc;

pub type QueueFactory = Arc<dyn Fn() -> Box<dyn Queue> + Send + Sync>;
pub type ProcessorFactory = Arc<dyn Fn() -> Box<dyn Processor> + Send + Sync>;
pub type StrategyFactory = Arc<dyn Fn() -> Box<dyn Strategy> + Send + Sync>;

/// Link-time registration record for a queue type
pub struct QueueFactoryEntry {
    pub type_name: &'static str,
    pub factory: fn() -> Box<dyn Queue>,
}

/// Link-time registration record for a processor type
pub struct ProcessorFactoryEntry {
    pub type_name: &'static str,
    pub factory: fn() -> Box<dyn Processor>,
}

/// Link-time registration record for a strategy type
pub struct StrategyFactoryEntry {
    pub type_name: &'static str,
    pub factory: fn() -> Box<dyn Strategy>,
}

inventory::collect!(QueueFactoryEntry);
inventory::collect!(ProcessorFactoryEntry);
inventory::collect!(StrategyFactoryEntry);

/// Type name → factory lookups for every plugin kind
#[derive(Default, Clone)]
pub struct PluginRegistry {
    queues: HashMap<String, QueueFactory>,
    processors: HashMap<String, ProcessorFactory>,
    strategies: HashMap<String, StrategyFactory>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("queues", &self.type_names(PluginKind::Queue))
            .field("processors", &self.type_names(PluginKind::Processor))
            .field("strategies", &self.type_names(PluginKind::Strategy))
            .finish()
    }
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every plugin registered with the
    /// `register_*!` macros
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for entry in inventory::iter::<QueueFactoryEntry> {
            let factory: QueueFactory = Arc::new(entry.factory);
            registry.queues.insert(entry.type_name.to_string(), factory);
        }
        for entry in inventory::iter::<ProcessorFactoryEntry> {
            let factory: ProcessorFactory = Arc::new(entry.factory);
            registry.processors.insert(entry.type_name.to_string(), factory);
        }
        for entry in inventory::iter::<StrategyFactoryEntry> {
            let factory: StrategyFactory = Arc::new(entry.factory);
            registry.strategies.insert(entry.type_name.to_string(), factory);
        }
        registry
    }

    pub fn register_queue<F>(&mut self, type_name: &str, factory: F) -> ConfigResult<()>
    where
        F: Fn() -> Box<dyn Queue> + Send + Sync + 'static,
    {
        let factory: QueueFactory = Arc::new(factory);
        insert_unique(&mut self.queues, PluginKind::Queue, type_name, factory)
    }

    pub fn register_processor<F>(&mut self, type_name: &str, factory: F) -> ConfigResult<()>
    where
        F: Fn() -> Box<dyn Processor> + Send + Sync + 'static,
    {
        let factory: ProcessorFactory = Arc::new(factory);
        insert_unique(&mut self.processors, PluginKind::Processor, type_name, factory)
    }

    pub fn register_strategy<F>(&mut self, type_name: &str, factory: F) -> ConfigResult<()>
    where
        F: Fn() -> Box<dyn Strategy> + Send + Sync + 'static,
    {
        let factory: StrategyFactory = Arc::new(factory);
        insert_unique(&mut self.strategies, PluginKind::Strategy, type_name, factory)
    }

    /// Instantiate an unconfigured queue of the given type
    pub fn create_queue(&self, type_name: &str) -> ConfigResult<Box<dyn Queue>> {
        lookup(&self.queues, PluginKind::Queue, type_name).map(|factory| factory())
    }

    /// Instantiate an unconfigured processor of the given type
    pub fn create_processor(&self, type_name: &str) -> ConfigResult<Box<dyn Processor>> {
        lookup(&self.processors, PluginKind::Processor, type_name).map(|factory| factory())
    }

    /// Instantiate an unconfigured strategy of the given type
    pub fn create_strategy(&self, type_name: &str) -> ConfigResult<Box<dyn Strategy>> {
        lookup(&self.strategies, PluginKind::Strategy, type_name).map(|factory| factory())
    }

    /// Sorted type names registered for a plugin kind
    pub fn type_names(&self, kind: PluginKind) -> Vec<String> {
        let mut names: Vec<String> = match kind {
            PluginKind::Queue => self.queues.keys().cloned().collect(),
            PluginKind::Processor => self.processors.keys().cloned().collect(),
            PluginKind::Strategy => self.strategies.keys().cloned().collect(),
        };
        names.sort();
        names
    }
}

fn insert_unique<F>(
    map: &mut HashMap<String, F>,
    kind: PluginKind,
    type_name: &str,
    factory: F,
) -> ConfigResult<()> {
    if map.contains_key(type_name) {
        return Err(ConfigError::DuplicateName {
            kind,
            name: type_name.to_string(),
        });
    }
    map.insert(type_name.to_string(), factory);
    Ok(())
}

fn lookup<'a, F>(
    map: &'a HashMap<String, F>,
    kind: PluginKind,
    type_name: &str,
) -> ConfigResult<&'a F> {
    map.get(type_name)
        .ok_or_else(|| ConfigError::UnknownPluginType {
            kind,
            type_name: type_name.to_string(),
        })
}
