//! Engine context
//!
//! Holds everything built from the configuration: named queues, processors
//! and strategies, the active strategy, the control channel sender and the
//! lifecycle flags. It is created once at load time and shared read-only
//! (behind an `Arc`) with every lifecycle handler.

use crate::config::{Config, ConfigError, ConfigResult};
use crate::core::control::ControlSender;
use crate::plugin::{PluginKind, PluginRegistry};
use crate::processor::Processor;
use crate::queue::Queue;
use crate::strategy::Strategy;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Flags shared by the lifecycle handlers
///
/// A run is claimed by the dispatcher when it accepts `Run` and released by
/// the run handler once `start` has returned. Between the claim and the
/// strategy accepting the start, the run is "starting"; a stop arriving in
/// that window waits for it so it has a pipeline to stop.
#[derive(Debug)]
pub struct LifecycleState {
    is_running: AtomicBool,
    strategy_initiated_stop: AtomicBool,
    starting: watch::Sender<bool>,
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self {
            is_running: AtomicBool::new(false),
            strategy_initiated_stop: AtomicBool::new(false),
            starting: watch::Sender::new(false),
        }
    }
}

impl LifecycleState {
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// Claim the run slot and assume the run will end by itself until a
    /// stop says otherwise. False if a run is already in progress, in which
    /// case nothing is changed.
    pub fn try_begin_run(&self) -> bool {
        if self
            .is_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.set_strategy_initiated_stop(true);
        self.starting.send_replace(true);
        true
    }

    /// The strategy has accepted (or refused) the start
    pub fn start_settled(&self) {
        self.starting.send_replace(false);
    }

    /// Release the run slot claimed by [`try_begin_run`](Self::try_begin_run)
    pub fn finish_run(&self) {
        self.starting.send_replace(false);
        self.is_running.store(false, Ordering::Release);
    }

    /// Wait until no claimed run is still on its way into the strategy
    pub async fn wait_start_settled(&self) {
        let mut starting = self.starting.subscribe();
        // The sender lives in `self`, so the channel can't close here
        let _ = starting.wait_for(|starting| !*starting).await;
    }

    /// True while a return from `start` means the pipeline ended by itself
    pub fn strategy_initiated_stop(&self) -> bool {
        self.strategy_initiated_stop.load(Ordering::Acquire)
    }

    pub fn set_strategy_initiated_stop(&self, value: bool) {
        self.strategy_initiated_stop.store(value, Ordering::Release);
    }
}

pub struct Context {
    config: Config,
    queues: HashMap<String, Arc<dyn Queue>>,
    processors: HashMap<String, Arc<dyn Processor>>,
    strategies: HashMap<String, Arc<dyn Strategy>>,
    active_strategy: Option<String>,
    control: ControlSender,
    state: LifecycleState,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("queues", &sorted_keys(&self.queues))
            .field("processors", &sorted_keys(&self.processors))
            .field("strategies", &sorted_keys(&self.strategies))
            .field("active_strategy", &self.active_strategy)
            .field("state", &self.state)
            .finish()
    }
}

impl Context {
    /// Empty context; plugins are added with the `add_*` methods
    pub fn new(config: Config, control: ControlSender) -> Self {
        Self {
            config,
            queues: HashMap::new(),
            processors: HashMap::new(),
            strategies: HashMap::new(),
            active_strategy: None,
            control,
            state: LifecycleState::default(),
        }
    }

    /// Build and configure every plugin named in `config`
    ///
    /// Queues are loaded first, then processors, then the single strategy,
    /// which resolves its queue and processor references against what has
    /// been loaded so far.
    pub fn load(
        config: Config,
        registry: &PluginRegistry,
        control: ControlSender,
    ) -> ConfigResult<Self> {
        let strategy_section = config.strategy_section()?.clone();
        let queue_sections = config.queue.clone();
        let processor_sections = config.processor.clone();
        let mut context = Self::new(config, control);

        for section in &queue_sections {
            log::debug!("Loading queue '{}' of type {}", section.name, section.plugin_type);
            context.check_unique(PluginKind::Queue, &section.name)?;
            let mut queue = registry.create_queue(&section.plugin_type)?;
            queue.configure(&section.options)?;
            context.add_queue(&section.name, Arc::from(queue))?;
        }

        for section in &processor_sections {
            log::debug!(
                "Loading processor '{}' of type {}",
                section.name,
                section.plugin_type
            );
            context.check_unique(PluginKind::Processor, &section.name)?;
            let mut processor = registry.create_processor(&section.plugin_type)?;
            processor.configure(&section.options)?;
            context.add_processor(&section.name, Arc::from(processor))?;
        }

        log::debug!(
            "Loading strategy '{}' of type {}",
            strategy_section.name,
            strategy_section.plugin_type
        );
        let mut strategy = registry.create_strategy(&strategy_section.plugin_type)?;
        strategy.configure(&strategy_section.name, &strategy_section.options, &context)?;
        context.add_strategy(&strategy_section.name, Arc::from(strategy))?;
        context.set_active_strategy(&strategy_section.name)?;

        log::info!(
            "Loaded {} queue(s), {} processor(s), strategy '{}'",
            context.queues.len(),
            context.processors.len(),
            strategy_section.name
        );
        Ok(context)
    }

    pub fn add_queue(&mut self, name: &str, queue: Arc<dyn Queue>) -> ConfigResult<()> {
        self.check_unique(PluginKind::Queue, name)?;
        self.queues.insert(name.to_string(), queue);
        Ok(())
    }

    pub fn add_processor(&mut self, name: &str, processor: Arc<dyn Processor>) -> ConfigResult<()> {
        self.check_unique(PluginKind::Processor, name)?;
        self.processors.insert(name.to_string(), processor);
        Ok(())
    }

    pub fn add_strategy(&mut self, name: &str, strategy: Arc<dyn Strategy>) -> ConfigResult<()> {
        self.check_unique(PluginKind::Strategy, name)?;
        self.strategies.insert(name.to_string(), strategy);
        Ok(())
    }

    pub fn set_active_strategy(&mut self, name: &str) -> ConfigResult<()> {
        if !self.strategies.contains_key(name) {
            return Err(ConfigError::UnknownReference {
                kind: PluginKind::Strategy,
                name: name.to_string(),
            });
        }
        self.active_strategy = Some(name.to_string());
        Ok(())
    }

    pub fn queue(&self, name: &str) -> Option<Arc<dyn Queue>> {
        self.queues.get(name).cloned()
    }

    pub fn processor(&self, name: &str) -> Option<Arc<dyn Processor>> {
        self.processors.get(name).cloned()
    }

    pub fn strategy(&self, name: &str) -> Option<Arc<dyn Strategy>> {
        self.strategies.get(name).cloned()
    }

    /// The strategy the lifecycle handlers drive
    pub fn active_strategy(&self) -> Option<Arc<dyn Strategy>> {
        self.active_strategy
            .as_deref()
            .and_then(|name| self.strategy(name))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn control(&self) -> &ControlSender {
        &self.control
    }

    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    fn check_unique(&self, kind: PluginKind, name: &str) -> ConfigResult<()> {
        let taken = match kind {
            PluginKind::Queue => self.queues.contains_key(name),
            PluginKind::Processor => self.processors.contains_key(name),
            PluginKind::Strategy => self.strategies.contains_key(name),
        };
        if taken {
            return Err(ConfigError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<&str> {
    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}
