//! Engine lifecycle handlers
//!
//! - `run` starts the active strategy and blocks until it returns. If the
//!   pipeline ended by itself the process terminates with success; if
//!   starting failed it terminates with the runtime error code. The
//!   dispatcher claims the run slot before `run` is called, so a second
//!   `Run` never reaches this handler while one is in progress.
//! - `stop` marks the stop as requested from outside, waits for a claimed
//!   run to reach the strategy, then stops the strategy and waits for it to
//!   drain.
//! - `status` prints the strategy statistics to stdout.

use crate::core::context::Context;
use crate::core::control::LifecycleHandler;
use crate::core::error_handling::log_error_with_context;
use crate::core::exit::ExitCode;
use crate::strategy::RuntimeError;
use async_trait::async_trait;
use std::sync::Arc;
use std::task::Poll;

#[derive(Debug, Default)]
pub struct EngineLifecycle;

impl EngineLifecycle {
    async fn terminate(context: &Context, code: ExitCode) {
        if let Err(e) = context.control().send_terminate(code).await {
            log::error!("{}", e);
        }
    }
}

#[async_trait]
impl LifecycleHandler for EngineLifecycle {
    async fn run(&self, context: Arc<Context>) {
        let state = context.state();
        let Some(strategy) = context.active_strategy() else {
            state.finish_run();
            log::error!("FATAL: no strategy loaded");
            Self::terminate(&context, ExitCode::RuntimeError).await;
            return;
        };

        log::info!("Engine running");

        // A strategy registers its run before its first suspension point,
        // so after one poll a stop has something to act on
        let mut start = strategy.start();
        let first = std::future::poll_fn(|cx| Poll::Ready(start.as_mut().poll(cx))).await;
        state.start_settled();
        let result = match first {
            Poll::Ready(result) => result,
            Poll::Pending => start.await,
        };
        state.finish_run();

        match result {
            Ok(()) => {
                if state.strategy_initiated_stop() {
                    log::info!("Strategy finished on its own; exiting");
                    Self::terminate(&context, ExitCode::Ok).await;
                }
            }
            Err(e @ RuntimeError::AlreadyRunning { .. }) => {
                log::warn!("Ignoring run request: {}", e);
            }
            Err(e) => {
                log_error_with_context(&e, "Starting strategy");
                Self::terminate(&context, ExitCode::RuntimeError).await;
            }
        }
    }

    async fn stop(&self, context: Arc<Context>) {
        let state = context.state();
        state.set_strategy_initiated_stop(false);
        let Some(strategy) = context.active_strategy() else {
            return;
        };

        state.wait_start_settled().await;
        log::info!("Engine stopping");
        if let Err(e) = strategy.stop().await {
            log_error_with_context(&e, "Stopping strategy");
            Self::terminate(&context, ExitCode::RuntimeError).await;
            return;
        }
        log::info!("Engine stopped");
    }

    async fn status(&self, context: Arc<Context>) {
        match context.active_strategy() {
            Some(strategy) => println!("{}", strategy.statistics().await),
            None => println!("No strategy loaded"),
        }
    }
}
