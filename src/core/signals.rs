//! OS signal bridge
//!
//! Translates process signals into control signals:
//!
//! - SIGINT / SIGTERM: `TerminateGraceful`, then escalation. If the graceful
//!   shutdown has not ended the process within the shutdown timeout, or a
//!   second SIGINT/SIGTERM arrives first, `Terminate(ShutdownForced)` is sent.
//!   The escalation fires at most once.
//! - SIGUSR1: `Status`.
//!
//! The bridge only enqueues signals; the dispatcher does the work.

use crate::core::control::ControlSender;
use crate::core::exit::ExitCode;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// How a graceful shutdown was escalated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    Timeout,
    SecondSignal,
}

pub struct SignalBridge {
    control: ControlSender,
    shutdown_timeout: Duration,
}

impl SignalBridge {
    pub fn new(control: ControlSender, shutdown_timeout: Duration) -> Self {
        Self {
            control,
            shutdown_timeout,
        }
    }

    /// Register the signal handlers and start forwarding.
    ///
    /// Must be called from within the tokio runtime.
    #[cfg(unix)]
    pub fn install(self) -> std::io::Result<Vec<JoinHandle<()>>> {
        use tokio::signal::unix::{signal, SignalKind};

        // Restore default SIGPIPE so writing to a closed pipe ends the process
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let mut user1 = signal(SignalKind::user_defined1())?;

        let status_control = self.control.clone();
        let status_task = tokio::spawn(async move {
            while user1.recv().await.is_some() {
                log::debug!("SIGUSR1 received");
                if status_control.send_status().await.is_err() {
                    break;
                }
            }
        });

        let control = self.control;
        let timeout = self.shutdown_timeout;
        let shutdown_task = tokio::spawn(async move {
            tokio::select! {
                _ = interrupt.recv() => log::warn!("SIGINT received"),
                _ = terminate.recv() => log::warn!("SIGTERM received"),
            }
            let second = async move {
                tokio::select! {
                    _ = interrupt.recv() => log::warn!("Second SIGINT received"),
                    _ = terminate.recv() => log::warn!("Second SIGTERM received"),
                }
            };
            escalate(&control, timeout, second).await;
        });

        Ok(vec![status_task, shutdown_task])
    }

    #[cfg(not(unix))]
    pub fn install(self) -> std::io::Result<Vec<JoinHandle<()>>> {
        let control = self.control;
        let timeout = self.shutdown_timeout;
        let shutdown_task = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            log::warn!("Ctrl-C received");
            let second = async {
                let _ = tokio::signal::ctrl_c().await;
                log::warn!("Second Ctrl-C received");
            };
            escalate(&control, timeout, second).await;
        });
        Ok(vec![shutdown_task])
    }
}

/// Start a graceful shutdown and force it after `timeout` or when `second`
/// completes, whichever comes first
pub async fn escalate<F>(control: &ControlSender, timeout: Duration, second: F) -> Escalation
where
    F: Future<Output = ()>,
{
    log::warn!(
        "Shutting down gracefully; forcing exit in {}s or on a second signal",
        timeout.as_secs()
    );
    if let Err(e) = control.send_terminate_graceful().await {
        log::error!("Can't request graceful shutdown: {}", e);
    }

    let escalation = tokio::select! {
        _ = tokio::time::sleep(timeout) => {
            log::error!("Graceful shutdown timed out after {:?}; forcing exit", timeout);
            Escalation::Timeout
        }
        _ = second => {
            log::warn!("Forcing exit");
            Escalation::SecondSignal
        }
    };

    if let Err(e) = control.send_terminate(ExitCode::ShutdownForced).await {
        log::error!("Can't force shutdown: {}", e);
    }
    escalation
}
