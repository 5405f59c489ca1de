//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use qp::config::{Config, ConfigResult, Options};
use qp::core::context::Context;
use qp::core::control::{control_channel, ControlReceiver};
use qp::plugin::PluginRegistry;
use qp::processor::{ProcessError, ProcessResult, Processor};
use qp::queue::Job;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Observations shared between a test and every `Recording` processor built
/// by the registry
#[derive(Default)]
pub struct Recorder {
    pub calls: AtomicUsize,
    pub acked: AtomicUsize,
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
    pub fail: AtomicBool,
    pub block: AtomicBool,
    pub release: Notify,
    pub delay_ms: AtomicUsize,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn acked(&self) -> usize {
        self.acked.load(Ordering::SeqCst)
    }
}

pub struct RecordingProcessor {
    recorder: Arc<Recorder>,
}

#[async_trait]
impl Processor for RecordingProcessor {
    fn configure(&mut self, _options: &Options) -> ConfigResult<()> {
        Ok(())
    }

    async fn process(&self, job: &Job) -> ProcessResult<()> {
        let recorder = &self.recorder;
        recorder.calls.fetch_add(1, Ordering::SeqCst);
        let now = recorder.active.fetch_add(1, Ordering::SeqCst) + 1;
        recorder.peak.fetch_max(now, Ordering::SeqCst);

        let delay = recorder.delay_ms.load(Ordering::SeqCst) as u64;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if recorder.block.load(Ordering::SeqCst) {
            recorder.release.notified().await;
        }
        recorder.active.fetch_sub(1, Ordering::SeqCst);

        if recorder.fail.load(Ordering::SeqCst) {
            job.reject().await?;
            return Err(ProcessError::failed("Recording", "told to fail"));
        }
        job.ack().await?;
        recorder.acked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Built-in plugins plus a `Recording` processor reporting to `recorder`
pub fn registry_with(recorder: &Arc<Recorder>) -> PluginRegistry {
    let mut registry = PluginRegistry::with_builtins();
    let recorder = recorder.clone();
    registry
        .register_processor("Recording", move || {
            Box::new(RecordingProcessor {
                recorder: recorder.clone(),
            })
        })
        .unwrap();
    registry
}

/// Memory queue `incoming` preloaded with `messages` bodies, processed by
/// `Recording` with `threads` workers
pub fn memory_pipeline(messages: usize, threads: usize) -> String {
    let bodies: Vec<String> = (0..messages).map(|i| format!("\"message {}\"", i)).collect();
    format!(
        r#"
[General]
ShutdownTimeout = 5

[[Queue]]
Name = "incoming"
Type = "Memory"
Options = {{ Messages = [{}] }}

[[Processor]]
Name = "recorder"
Type = "Recording"

[[Strategy]]
Name = "main"
Type = "ParallelProcessing"
Options = {{ MaxThreads = {}, Queue = "incoming", Processor = "recorder" }}
"#,
        bodies.join(", "),
        threads
    )
}

pub fn load_context(
    config_text: &str,
    registry: &PluginRegistry,
) -> ConfigResult<(Arc<Context>, ControlReceiver)> {
    let config = Config::from_toml_str(config_text, Path::new("test.toml"))?;
    let (control, receiver) = control_channel();
    let context = Context::load(config, registry, control)?;
    Ok((Arc::new(context), receiver))
}

pub fn write_config(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("qp.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

/// Poll `condition` every few milliseconds for up to five seconds
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached within 5s");
}
