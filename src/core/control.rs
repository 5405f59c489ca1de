//! Control-signal dispatcher
//!
//! Every lifecycle transition of the engine travels as a [`ControlSignal`]
//! through one channel. The dispatcher reads it on a single task and hands
//! `Run`, `Stop`, `Status` and `TerminateGraceful` to their handlers on
//! spawned tasks, so a long `Run` never blocks a later `Stop`. `Terminate`
//! is handled inline: the dispatch loop returns its exit code and the caller
//! ends the process without waiting for anything still running.

use crate::core::context::Context;
use crate::core::exit::ExitCode;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Buffer of the control channel; senders wait while it is full
pub const CONTROL_CHANNEL_CAPACITY: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Run,
    Stop,
    Status,
    Terminate(ExitCode),
    TerminateGraceful,
}

#[derive(Debug, thiserror::Error)]
#[error("Control channel closed; dropped {signal:?}")]
pub struct ControlError {
    pub signal: ControlSignal,
}

/// Cloneable sending side of the control channel
#[derive(Debug, Clone)]
pub struct ControlSender {
    tx: mpsc::Sender<ControlSignal>,
}

impl ControlSender {
    /// Enqueue a signal, waiting while the channel is full
    pub async fn send(&self, signal: ControlSignal) -> Result<(), ControlError> {
        log::debug!("Control signal queued: {:?}", signal);
        self.tx
            .send(signal)
            .await
            .map_err(|e| ControlError { signal: e.0 })
    }

    pub async fn send_run(&self) -> Result<(), ControlError> {
        self.send(ControlSignal::Run).await
    }

    pub async fn send_stop(&self) -> Result<(), ControlError> {
        self.send(ControlSignal::Stop).await
    }

    pub async fn send_status(&self) -> Result<(), ControlError> {
        self.send(ControlSignal::Status).await
    }

    pub async fn send_terminate(&self, code: ExitCode) -> Result<(), ControlError> {
        self.send(ControlSignal::Terminate(code)).await
    }

    pub async fn send_terminate_graceful(&self) -> Result<(), ControlError> {
        self.send(ControlSignal::TerminateGraceful).await
    }
}

/// Receiving side, consumed by [`Dispatcher::new`]
#[derive(Debug)]
pub struct ControlReceiver {
    rx: mpsc::Receiver<ControlSignal>,
}

impl ControlReceiver {
    pub async fn recv(&mut self) -> Option<ControlSignal> {
        self.rx.recv().await
    }
}

pub fn control_channel() -> (ControlSender, ControlReceiver) {
    let (tx, rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);
    (ControlSender { tx }, ControlReceiver { rx })
}

/// Reactions to lifecycle signals
#[async_trait]
pub trait LifecycleHandler: Send + Sync + 'static {
    /// Called with the run slot of the context state already claimed; the
    /// handler releases it with `finish_run` when it returns.
    async fn run(&self, context: Arc<Context>);
    async fn stop(&self, context: Arc<Context>);
    async fn status(&self, context: Arc<Context>);
}

pub struct Dispatcher<H: LifecycleHandler> {
    context: Arc<Context>,
    handler: Arc<H>,
    receiver: ControlReceiver,
    tasks: JoinSet<()>,
}

impl<H: LifecycleHandler> Dispatcher<H> {
    pub fn new(context: Arc<Context>, handler: Arc<H>, receiver: ControlReceiver) -> Self {
        Self {
            context,
            handler,
            receiver,
            tasks: JoinSet::new(),
        }
    }

    /// Dispatch signals until a `Terminate` arrives and return its code
    pub async fn run(mut self) -> ExitCode {
        while let Some(signal) = self.receiver.recv().await {
            if let Some(code) = self.dispatch(signal) {
                return code;
            }
        }
        // The context keeps a sender alive, so this only happens if it was dropped
        log::error!("Control channel closed without a terminate signal");
        ExitCode::RuntimeError
    }

    /// Route one signal. Returns the exit code for `Terminate`.
    pub fn dispatch(&mut self, signal: ControlSignal) -> Option<ExitCode> {
        self.reap_finished();
        log::debug!("Dispatching {:?}", signal);

        let context = self.context.clone();
        let handler = self.handler.clone();
        match signal {
            ControlSignal::Run => {
                // Claimed here so a Stop dispatched after this Run always
                // sees it, however the handler tasks get scheduled
                if !context.state().try_begin_run() {
                    log::warn!("Run requested while already running; ignored");
                    return None;
                }
                self.tasks.spawn(async move { handler.run(context).await });
            }
            ControlSignal::Stop => {
                self.tasks.spawn(async move { handler.stop(context).await });
            }
            ControlSignal::Status => {
                self.tasks.spawn(async move { handler.status(context).await });
            }
            ControlSignal::TerminateGraceful => {
                self.tasks.spawn(async move {
                    handler.stop(context.clone()).await;
                    if let Err(e) = context.control().send_terminate(ExitCode::Ok).await {
                        log::error!("Graceful shutdown could not finish: {}", e);
                    }
                });
            }
            ControlSignal::Terminate(code) => {
                log::info!("Terminating with exit code {} ({})", code.code(), code);
                return Some(code);
            }
        }
        None
    }

    /// Wait for every handler task spawned so far
    pub async fn join_handlers(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            log_join_failure(joined);
        }
    }

    fn reap_finished(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            log_join_failure(joined);
        }
    }
}

fn log_join_failure(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        log::error!("Lifecycle handler task failed: {}", e);
    }
}
