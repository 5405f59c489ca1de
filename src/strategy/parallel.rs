//! Parallel processing strategy
//!
//! One fetch loop consumes the queue and hands jobs to a pool of
//! `MaxThreads` workers over a bounded channel of the same capacity, so at
//! most `MaxThreads` jobs are in a processor at any time and the fetch loop
//! waits when every worker is busy. `ProcessorThroughput` caps how many
//! fetches start per calendar second (zero means unthrottled).
//!
//! Stopping flips a watch flag. The fetch loop exits and drops its sender,
//! workers finish the jobs they hold, drain what is buffered, and `start`
//! returns once the last worker is done.

use crate::config::{parse_options, ConfigError, ConfigResult, Options};
use crate::core::context::Context;
use crate::core::exit::ExitCode;
use crate::core::sync::handle_mutex_poison;
use crate::core::time::{SystemTimeProvider, TimeProvider};
use crate::plugin::PluginKind;
use crate::processor::{ProcessError, Processor};
use crate::queue::{Disposition, Job, Queue};
use crate::strategy::{RuntimeError, RuntimeResult, Statistics, Status, Strategy, Throttle};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strum_macros::{Display, EnumString};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

/// Pause after a failed consume before trying again
pub const CONSUME_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Reaction to a processor returning an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum OnProcessingError {
    /// Count it and carry on
    Ignore,
    /// Count it, log a warning and carry on
    #[default]
    Warning,
    /// Halt the pipeline and abort the process
    Panic,
}

/// Invoked once when the `panic` policy trips
pub type FatalHandler = Arc<dyn Fn(&ProcessError) + Send + Sync>;

fn abort_process(error: &ProcessError) {
    log::error!("FATAL: processing error with OnProcessingError=panic: {}", error);
    crate::core::logging::flush_logging();
    ExitCode::RuntimeError.exit()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct ParallelProcessingConfiguration {
    #[serde(default)]
    max_threads: i64,
    #[serde(default)]
    processor_throughput: i64,
    queue: String,
    processor: String,
    #[serde(default)]
    on_processing_error: Option<String>,
}

/// Resolved configuration
struct Pipeline {
    name: String,
    queue_name: String,
    processor_name: String,
    max_threads: usize,
    throughput: u64,
    policy: OnProcessingError,
    queue: Arc<dyn Queue>,
    processor: Arc<dyn Processor>,
}

#[derive(Default)]
struct Counters {
    processed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
    consume_errors: AtomicU64,
}

/// Handles to a run in progress
struct Session {
    stop: Arc<watch::Sender<bool>>,
    drained: watch::Receiver<bool>,
}

pub struct ParallelProcessing {
    pipeline: Option<Pipeline>,
    session: Mutex<Option<Session>>,
    running: AtomicBool,
    started_at: Mutex<Option<DateTime<Utc>>>,
    counters: Arc<Counters>,
    clock: Arc<dyn TimeProvider>,
    on_fatal: FatalHandler,
}

impl Default for ParallelProcessing {
    fn default() -> Self {
        Self {
            pipeline: None,
            session: Mutex::new(None),
            running: AtomicBool::new(false),
            started_at: Mutex::new(None),
            counters: Arc::new(Counters::default()),
            clock: Arc::new(SystemTimeProvider),
            on_fatal: Arc::new(abort_process),
        }
    }
}

impl ParallelProcessing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the clock used by the throughput throttle
    pub fn with_time_provider(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace what happens when the `panic` policy trips (aborts the
    /// process by default)
    pub fn with_fatal_handler(mut self, handler: FatalHandler) -> Self {
        self.on_fatal = handler;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn strategy_name(&self) -> String {
        self.pipeline
            .as_ref()
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "ParallelProcessing".to_string())
    }

    fn lock_session(&self) -> RuntimeResult<std::sync::MutexGuard<'_, Option<Session>>> {
        handle_mutex_poison(self.session.lock(), |message| RuntimeError::Internal {
            message,
        })
    }

    fn finish_session(&self) -> RuntimeResult<()> {
        *self.lock_session()? = None;
        self.running.store(false, Ordering::Release);
        Ok(())
    }
}

#[async_trait]
impl Strategy for ParallelProcessing {
    fn configure(&mut self, name: &str, options: &Options, context: &Context) -> ConfigResult<()> {
        if self.is_running() {
            return Err(ConfigError::invalid_options(
                name,
                "can't reconfigure a running strategy",
            ));
        }

        let configuration: ParallelProcessingConfiguration = parse_options(name, options)?;

        if configuration.max_threads <= 0 {
            return Err(ConfigError::invalid_options(
                name,
                format!("MaxThreads should be > 0, got {}", configuration.max_threads),
            ));
        }
        if configuration.processor_throughput < 0 {
            return Err(ConfigError::invalid_options(
                name,
                format!(
                    "ProcessorThroughput should be >= 0, got {}",
                    configuration.processor_throughput
                ),
            ));
        }
        let policy = match configuration.on_processing_error.as_deref() {
            None => OnProcessingError::default(),
            Some(value) => OnProcessingError::from_str(value).map_err(|_| {
                ConfigError::invalid_options(
                    name,
                    format!(
                        "OnProcessingError should be one of ignore, warning, panic; got '{}'",
                        value
                    ),
                )
            })?,
        };

        let queue = context
            .queue(&configuration.queue)
            .ok_or_else(|| ConfigError::UnknownReference {
                kind: PluginKind::Queue,
                name: configuration.queue.clone(),
            })?;
        let processor = context.processor(&configuration.processor).ok_or_else(|| {
            ConfigError::UnknownReference {
                kind: PluginKind::Processor,
                name: configuration.processor.clone(),
            }
        })?;

        log::info!(
            "Strategy '{}' configured: queue={} processor={} threads={} throughput={} on_error={}",
            name,
            configuration.queue,
            configuration.processor,
            configuration.max_threads,
            configuration.processor_throughput,
            policy
        );

        self.pipeline = Some(Pipeline {
            name: name.to_string(),
            queue_name: configuration.queue,
            processor_name: configuration.processor,
            max_threads: configuration.max_threads as usize,
            throughput: configuration.processor_throughput as u64,
            policy,
            queue,
            processor,
        });
        Ok(())
    }

    async fn start(&self) -> RuntimeResult<()> {
        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or_else(|| RuntimeError::NotConfigured {
                strategy: self.strategy_name(),
            })?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let stop_tx = Arc::new(stop_tx);
        let (drained_tx, drained_rx) = watch::channel(false);
        {
            let mut session = self.lock_session()?;
            if session.is_some() {
                return Err(RuntimeError::AlreadyRunning {
                    strategy: pipeline.name.clone(),
                });
            }
            *session = Some(Session {
                stop: stop_tx.clone(),
                drained: drained_rx,
            });
        }
        self.running.store(true, Ordering::Release);
        *handle_mutex_poison(self.started_at.lock(), |message| RuntimeError::Internal {
            message,
        })? = Some(Utc::now());

        log::info!(
            "Strategy '{}' started with {} workers",
            pipeline.name,
            pipeline.max_threads
        );

        let (jobs_tx, jobs_rx) = mpsc::channel::<Job>(pipeline.max_threads);
        let jobs_rx = Arc::new(tokio::sync::Mutex::new(jobs_rx));
        let halted = Arc::new(AtomicBool::new(false));

        let mut workers = JoinSet::new();
        for id in 1..=pipeline.max_threads {
            workers.spawn(run_worker(Worker {
                id,
                jobs: jobs_rx.clone(),
                processor: pipeline.processor.clone(),
                policy: pipeline.policy,
                counters: self.counters.clone(),
                halted: halted.clone(),
                stop: stop_tx.clone(),
                on_fatal: self.on_fatal.clone(),
            }));
        }
        drop(jobs_rx);

        let throttle = (pipeline.throughput > 0)
            .then(|| Throttle::new(pipeline.throughput, self.clock.clone()));
        let fetcher = tokio::spawn(fetch_loop(
            pipeline.queue.clone(),
            jobs_tx,
            stop_rx,
            throttle,
            self.counters.clone(),
        ));

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                log::error!("Worker of strategy '{}' ended abnormally: {}", pipeline.name, e);
            }
        }
        // Workers also end when halted; make sure the fetch loop follows
        stop_tx.send_replace(true);
        if let Err(e) = fetcher.await {
            log::error!("Fetch loop of strategy '{}' ended abnormally: {}", pipeline.name, e);
        }

        self.finish_session()?;
        drained_tx.send_replace(true);
        log::info!("Strategy '{}' stopped", pipeline.name);
        Ok(())
    }

    async fn stop(&self) -> RuntimeResult<()> {
        let (stop, mut drained) = match self.lock_session()?.as_ref() {
            Some(session) => (session.stop.clone(), session.drained.clone()),
            None => {
                log::debug!("Strategy '{}' is not running; nothing to stop", self.strategy_name());
                return Ok(());
            }
        };

        log::info!("Stopping strategy '{}'", self.strategy_name());
        stop.send_replace(true);
        drained
            .wait_for(|done| *done)
            .await
            .map(|_| ())
            .map_err(|_| RuntimeError::Internal {
                message: format!(
                    "strategy '{}' ended without reporting that it drained",
                    self.strategy_name()
                ),
            })
    }

    async fn statistics(&self) -> Statistics {
        let (queue, processor, messages_in_queue) = match self.pipeline.as_ref() {
            Some(pipeline) => {
                let backlog = match pipeline.queue.number_of_messages().await {
                    Ok(count) => count,
                    Err(e) => {
                        log::warn!("Can't read backlog of queue '{}': {}", pipeline.queue_name, e);
                        None
                    }
                };
                (
                    pipeline.queue_name.clone(),
                    pipeline.processor_name.clone(),
                    backlog,
                )
            }
            None => (String::new(), String::new(), None),
        };

        Statistics {
            strategy: self.strategy_name(),
            queue,
            processor,
            status: if self.is_running() {
                Status::Running
            } else {
                Status::Stopped
            },
            processed: self.counters.processed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            consume_errors: self.counters.consume_errors.load(Ordering::Relaxed),
            started_at: self
                .started_at
                .lock()
                .map(|guard| *guard)
                .unwrap_or_else(|poisoned| *poisoned.into_inner()),
            messages_in_queue,
        }
    }
}

async fn fetch_loop(
    queue: Arc<dyn Queue>,
    jobs: mpsc::Sender<Job>,
    mut stop: watch::Receiver<bool>,
    mut throttle: Option<Throttle>,
    counters: Arc<Counters>,
) {
    loop {
        if *stop.borrow() {
            break;
        }
        if let Some(throttle) = throttle.as_mut() {
            if !throttle.acquire(&stop).await {
                break;
            }
        }

        let consumed = tokio::select! {
            biased;
            _ = stop.changed() => break,
            consumed = queue.consume() => consumed,
        };

        match consumed {
            Ok(message) => {
                log::trace!("Fetched message {} from '{}'", message.id(), queue.name());
                if jobs.send(Job::new(queue.clone(), message)).await.is_err() {
                    log::debug!("No workers left for queue '{}'", queue.name());
                    break;
                }
            }
            Err(e) => {
                counters.consume_errors.fetch_add(1, Ordering::Relaxed);
                log::error!("Error on message consume from '{}': {}", queue.name(), e);
                tokio::select! {
                    biased;
                    _ = stop.changed() => break,
                    _ = tokio::time::sleep(CONSUME_ERROR_BACKOFF) => {}
                }
            }
        }
    }
    log::debug!("Fetch loop for '{}' finished", queue.name());
}

struct Worker {
    id: usize,
    jobs: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    processor: Arc<dyn Processor>,
    policy: OnProcessingError,
    counters: Arc<Counters>,
    halted: Arc<AtomicBool>,
    stop: Arc<watch::Sender<bool>>,
    on_fatal: FatalHandler,
}

async fn run_worker(worker: Worker) {
    loop {
        let next = worker.jobs.lock().await.recv().await;
        let Some(job) = next else {
            break;
        };
        if worker.halted.load(Ordering::Acquire) {
            break;
        }

        log::debug!("[Worker {}] processing message {}", worker.id, job.message().id());
        let result = worker.processor.process(&job).await;

        // Only outcomes the backend confirmed are counted
        match (job.disposition(), job.requested()) {
            (Disposition::Acked, _) => {
                worker.counters.processed.fetch_add(1, Ordering::Relaxed);
            }
            (Disposition::Rejected, _) => {
                worker.counters.rejected.fetch_add(1, Ordering::Relaxed);
            }
            (Disposition::Pending, Disposition::Pending) => log::warn!(
                "[Worker {}] processor left message {} neither acked nor rejected",
                worker.id,
                job.message().id()
            ),
            (Disposition::Pending, requested) => log::debug!(
                "[Worker {}] queue did not confirm {} of message {}",
                worker.id,
                requested,
                job.message().id()
            ),
        }

        if let Err(e) = result {
            worker.counters.failed.fetch_add(1, Ordering::Relaxed);
            match worker.policy {
                OnProcessingError::Ignore => {}
                OnProcessingError::Warning => {
                    log::warn!("[Worker {}] error processing message: {}", worker.id, e)
                }
                OnProcessingError::Panic => {
                    if !worker.halted.swap(true, Ordering::AcqRel) {
                        worker.stop.send_replace(true);
                        (worker.on_fatal)(&e);
                    }
                    break;
                }
            }
        }
    }
    log::debug!("[Worker {}] finished", worker.id);
}

fn create() -> Box<dyn Strategy> {
    Box::new(ParallelProcessing::new())
}

crate::register_strategy!("ParallelProcessing", create);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::control::control_channel;
    use crate::core::time::MockTimeProvider;
    use crate::processor::ProcessResult;
    use crate::queue::builtin::MemoryQueue;
    use crate::queue::{Message, QueueError, QueueResult};
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::timeout;

    /// Acks after a short delay and records peak concurrency
    #[derive(Default)]
    struct SlowAcker {
        delay: Duration,
        active: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Processor for SlowAcker {
        fn configure(&mut self, _options: &Options) -> ConfigResult<()> {
            Ok(())
        }

        async fn process(&self, job: &Job) -> ProcessResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            job.ack().await?;
            Ok(())
        }
    }

    /// Rejects and reports an error every time
    #[derive(Default)]
    struct AlwaysFails {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Processor for AlwaysFails {
        fn configure(&mut self, _options: &Options) -> ConfigResult<()> {
            Ok(())
        }

        async fn process(&self, job: &Job) -> ProcessResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            job.reject().await?;
            Err(ProcessError::failed("AlwaysFails", "boom"))
        }
    }

    /// Serves messages from a memory queue but every ack fails
    struct AckFails {
        inner: MemoryQueue,
    }

    #[async_trait]
    impl Queue for AckFails {
        fn name(&self) -> &str {
            "AckFails"
        }

        fn configure(&mut self, _options: &Options) -> ConfigResult<()> {
            Ok(())
        }

        async fn consume(&self) -> QueueResult<Message> {
            self.inner.consume().await
        }

        async fn ack(&self, _message: &Message) -> QueueResult<()> {
            Err(QueueError::operation_failed(self.name(), "ack", "backend unavailable"))
        }

        async fn reject(&self, message: &Message) -> QueueResult<()> {
            self.inner.reject(message).await
        }

        async fn number_of_messages(&self) -> QueueResult<Option<usize>> {
            self.inner.number_of_messages().await
        }
    }

    /// Acks immediately and notes the clock's second of every call
    struct SecondRecorder {
        clock: MockTimeProvider,
        seconds: Mutex<Vec<u64>>,
    }

    impl SecondRecorder {
        fn calls(&self) -> usize {
            self.seconds.lock().unwrap().len()
        }

        fn per_second(&self) -> BTreeMap<u64, usize> {
            let mut buckets = BTreeMap::new();
            for second in self.seconds.lock().unwrap().iter() {
                *buckets.entry(*second).or_insert(0) += 1;
            }
            buckets
        }
    }

    #[async_trait]
    impl Processor for SecondRecorder {
        fn configure(&mut self, _options: &Options) -> ConfigResult<()> {
            Ok(())
        }

        async fn process(&self, job: &Job) -> ProcessResult<()> {
            self.seconds.lock().unwrap().push(self.clock.epoch_second());
            job.ack().await?;
            Ok(())
        }
    }

    fn options(toml_text: &str) -> Options {
        toml::from_str(toml_text).unwrap()
    }

    fn context_with(queue: Arc<dyn Queue>, processor: Arc<dyn Processor>) -> Context {
        let (control, _receiver) = control_channel();
        let mut context = Context::new(Config::default(), control);
        context.add_queue("incoming", queue).unwrap();
        context.add_processor("worker", processor).unwrap();
        context
    }

    fn configured(context: &Context, extra: &str) -> ConfigResult<ParallelProcessing> {
        let mut strategy = ParallelProcessing::new();
        let text = format!("Queue = \"incoming\"\nProcessor = \"worker\"\n{}", extra);
        strategy.configure("main", &options(&text), context)?;
        Ok(strategy)
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[test]
    fn test_max_threads_must_be_positive() {
        let queue = Arc::new(MemoryQueue::new("incoming"));
        let context = context_with(queue, Arc::new(SlowAcker::default()));

        for extra in ["MaxThreads = 0", "", "MaxThreads = -2"] {
            let err = configured(&context, extra).err().expect("should be rejected");
            assert!(matches!(err, ConfigError::InvalidOptions { .. }), "{:?}", err);
        }
    }

    #[test]
    fn test_unknown_references_are_config_errors() {
        let queue = Arc::new(MemoryQueue::new("incoming"));
        let context = context_with(queue, Arc::new(SlowAcker::default()));
        let mut strategy = ParallelProcessing::new();

        let err = strategy
            .configure(
                "main",
                &options("MaxThreads = 1\nQueue = \"nope\"\nProcessor = \"worker\""),
                &context,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnknownReference {
                kind: PluginKind::Queue,
                ..
            }
        ));

        let err = strategy
            .configure(
                "main",
                &options("MaxThreads = 1\nQueue = \"incoming\"\nProcessor = \"nope\""),
                &context,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnknownReference {
                kind: PluginKind::Processor,
                ..
            }
        ));
    }

    #[test]
    fn test_error_policy_parsing() {
        let queue = Arc::new(MemoryQueue::new("incoming"));
        let context = context_with(queue, Arc::new(SlowAcker::default()));

        assert!(configured(&context, "MaxThreads = 1\nOnProcessingError = \"Panic\"").is_ok());
        assert!(configured(&context, "MaxThreads = 1\nOnProcessingError = \"explode\"").is_err());
        assert!(configured(&context, "MaxThreads = 1\nProcessorThroughput = -1").is_err());
    }

    #[tokio::test]
    async fn test_start_before_configure_fails() {
        let strategy = ParallelProcessing::new();
        assert!(matches!(
            strategy.start().await,
            Err(RuntimeError::NotConfigured { .. })
        ));
    }

    #[tokio::test]
    async fn test_stop_when_not_running_is_noop() {
        let strategy = ParallelProcessing::new();
        strategy.stop().await.unwrap();
        strategy.stop().await.unwrap();
        assert_eq!(strategy.statistics().await.status, Status::Stopped);
    }

    #[tokio::test]
    async fn test_concurrency_bounded_and_all_acked() {
        let queue = Arc::new(MemoryQueue::new("incoming"));
        for i in 0..10 {
            queue.push(format!("message {}", i));
        }
        let processor = Arc::new(SlowAcker {
            delay: Duration::from_millis(20),
            ..Default::default()
        });
        let context = context_with(queue.clone(), processor.clone());
        let strategy = Arc::new(configured(&context, "MaxThreads = 3").unwrap());

        let runner = {
            let strategy = strategy.clone();
            tokio::spawn(async move { strategy.start().await })
        };

        wait_until(|| queue.acked_ids().len() == 10).await;
        strategy.stop().await.unwrap();
        runner.await.unwrap().unwrap();

        assert!(processor.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(processor.calls.load(Ordering::SeqCst), 10);

        let stats = strategy.statistics().await;
        assert_eq!(stats.processed, 10);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.status, Status::Stopped);
        assert_eq!(stats.messages_in_queue, Some(0));
        assert!(stats.started_at.is_some());
    }

    #[tokio::test]
    async fn test_second_start_is_rejected_while_running() {
        let queue = Arc::new(MemoryQueue::new("incoming"));
        let context = context_with(queue, Arc::new(SlowAcker::default()));
        let strategy = Arc::new(configured(&context, "MaxThreads = 2").unwrap());

        let runner = {
            let strategy = strategy.clone();
            tokio::spawn(async move { strategy.start().await })
        };
        wait_until(|| strategy.is_running()).await;

        assert!(matches!(
            strategy.start().await,
            Err(RuntimeError::AlreadyRunning { .. })
        ));

        strategy.stop().await.unwrap();
        runner.await.unwrap().unwrap();
        assert!(!strategy.is_running());
    }

    #[tokio::test]
    async fn test_stop_waits_for_in_flight_job() {
        let queue = Arc::new(MemoryQueue::new("incoming"));
        queue.push("slow");
        let processor = Arc::new(SlowAcker {
            delay: Duration::from_millis(200),
            ..Default::default()
        });
        let context = context_with(queue.clone(), processor.clone());
        let strategy = Arc::new(configured(&context, "MaxThreads = 1").unwrap());

        let runner = {
            let strategy = strategy.clone();
            tokio::spawn(async move { strategy.start().await })
        };
        wait_until(|| processor.active.load(Ordering::SeqCst) == 1).await;

        strategy.stop().await.unwrap();

        assert_eq!(queue.acked_ids(), vec!["1".to_string()]);
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let queue = Arc::new(MemoryQueue::new("incoming"));
        let context = context_with(queue.clone(), Arc::new(SlowAcker::default()));
        let strategy = Arc::new(configured(&context, "MaxThreads = 1").unwrap());

        for round in 1..=2 {
            let runner = {
                let strategy = strategy.clone();
                tokio::spawn(async move { strategy.start().await })
            };
            queue.push(format!("round {}", round));
            wait_until(|| queue.acked_ids().len() == round).await;
            strategy.stop().await.unwrap();
            runner.await.unwrap().unwrap();
        }

        assert_eq!(strategy.statistics().await.processed, 2);
    }

    #[tokio::test]
    async fn test_warning_policy_keeps_going() {
        let queue = Arc::new(MemoryQueue::new("incoming"));
        for _ in 0..4 {
            queue.push("bad");
        }
        let processor = Arc::new(AlwaysFails::default());
        let context = context_with(queue.clone(), processor.clone());
        let strategy = Arc::new(configured(&context, "MaxThreads = 2").unwrap());

        let runner = {
            let strategy = strategy.clone();
            tokio::spawn(async move { strategy.start().await })
        };
        wait_until(|| queue.rejected_ids().len() == 4).await;
        strategy.stop().await.unwrap();
        runner.await.unwrap().unwrap();

        let stats = strategy.statistics().await;
        assert_eq!(stats.failed, 4);
        assert_eq!(stats.rejected, 4);
        assert_eq!(stats.processed, 0);
    }

    #[tokio::test]
    async fn test_panic_policy_halts_pipeline() {
        let queue = Arc::new(MemoryQueue::new("incoming"));
        for _ in 0..5 {
            queue.push("bad");
        }
        let processor = Arc::new(AlwaysFails::default());
        let context = context_with(queue.clone(), processor.clone());
        let fatal_calls = Arc::new(AtomicUsize::new(0));
        let handler: FatalHandler = {
            let fatal_calls = fatal_calls.clone();
            Arc::new(move |_error: &ProcessError| {
                fatal_calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        let strategy = configured(&context, "MaxThreads = 1\nOnProcessingError = \"panic\"")
            .unwrap()
            .with_fatal_handler(handler);

        // The pipeline ends on its own once halted
        timeout(Duration::from_secs(5), strategy.start())
            .await
            .expect("halted pipeline should finish")
            .unwrap();

        assert_eq!(fatal_calls.load(Ordering::SeqCst), 1);
        assert_eq!(processor.calls.load(Ordering::SeqCst), 1);
        assert!(!strategy.is_running());
    }

    #[tokio::test]
    async fn test_failed_backend_ack_is_not_counted_as_processed() {
        let queue = Arc::new(AckFails {
            inner: MemoryQueue::new("incoming"),
        });
        queue.inner.push("unlucky");
        let processor = Arc::new(SlowAcker::default());
        let context = context_with(queue.clone(), processor.clone());
        let strategy = Arc::new(configured(&context, "MaxThreads = 1").unwrap());

        let runner = {
            let strategy = strategy.clone();
            tokio::spawn(async move { strategy.start().await })
        };
        wait_until(|| processor.calls.load(Ordering::SeqCst) == 1).await;
        strategy.stop().await.unwrap();
        runner.await.unwrap().unwrap();

        let stats = strategy.statistics().await;
        assert_eq!(stats.processed, 0);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.rejected, 0);
    }

    #[tokio::test]
    async fn test_throughput_is_capped_per_calendar_second() {
        let queue = Arc::new(MemoryQueue::new("incoming"));
        for i in 0..40 {
            queue.push(format!("message {}", i));
        }
        let clock = MockTimeProvider::at_epoch_second(1_000);
        let processor = Arc::new(SecondRecorder {
            clock: clock.clone(),
            seconds: Mutex::new(Vec::new()),
        });
        let context = context_with(queue.clone(), processor.clone());
        let strategy = Arc::new(
            configured(&context, "MaxThreads = 5\nProcessorThroughput = 5")
                .unwrap()
                .with_time_provider(Arc::new(clock.clone())),
        );

        let runner = {
            let strategy = strategy.clone();
            tokio::spawn(async move { strategy.start().await })
        };

        for second in 1..=4 {
            wait_until(|| processor.calls() == second * 5).await;
            // The budget is spent; nothing more gets through this second
            tokio::time::sleep(Duration::from_millis(50)).await;
            assert_eq!(processor.calls(), second * 5);
            clock.advance_time(Duration::from_secs(1));
        }
        strategy.stop().await.unwrap();
        runner.await.unwrap().unwrap();

        let per_second = processor.per_second();
        for second in 1_000..1_004 {
            assert_eq!(per_second.get(&second), Some(&5), "{:?}", per_second);
        }
        assert!(per_second.values().all(|count| *count <= 5), "{:?}", per_second);
    }
}
