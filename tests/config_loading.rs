//! Loading configuration files into a wired context

mod common;

use common::{load_context, memory_pipeline, registry_with, write_config, Recorder};
use qp::config::{Config, ConfigError};
use qp::core::context::Context;
use qp::core::control::control_channel;
use qp::plugin::{PluginKind, PluginRegistry};
use tempfile::TempDir;

#[tokio::test]
async fn test_load_file_with_builtin_plugins() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("app.log");
    std::fs::write(&log, "").unwrap();
    let path = write_config(
        dir.path(),
        &format!(
            r#"
[General]
LogLevel = "info"

[[Queue]]
Name = "log"
Type = "Tail"
Options = {{ Path = "{}", PollInterval = 50 }}

[[Queue]]
Name = "noise"
Type = "Dummy"
Options = {{ RandomSleepDelay = 10 }}

[[Queue]]
Name = "remote"
Type = "Sqs"
Options = {{ QueueName = "jobs", AwsRegion = "eu-west-1", AwsProfile = "default", WaitTimeSeconds = 5 }}

[[Processor]]
Name = "hook"
Type = "HTTPProxy"
Options = {{ Url = "http://127.0.0.1:9/hook", Timeout = 2 }}

[[Processor]]
Name = "script"
Type = "Shell"
Options = {{ Command = "echo %msg%" }}

[[Strategy]]
Name = "main"
Type = "ParallelProcessing"
Options = {{ MaxThreads = 4, ProcessorThroughput = 100, Queue = "log", Processor = "script", OnProcessingError = "ignore" }}
"#,
            log.display()
        ),
    );

    let config = Config::load(&path).await.unwrap();
    let (control, _receiver) = control_channel();
    let context = Context::load(config, &PluginRegistry::with_builtins(), control).unwrap();

    assert!(context.queue("log").is_some());
    assert!(context.queue("noise").is_some());
    assert_eq!(context.queue("remote").unwrap().name(), "Sqs");
    assert!(context.processor("hook").is_some());
    assert!(context.processor("script").is_some());
    assert!(context.strategy("main").is_some());
}

#[test]
fn test_zero_max_threads_is_misconfiguration() {
    let recorder = Recorder::new();
    let err = load_context(&memory_pipeline(1, 0), &registry_with(&recorder)).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidOptions { .. }), "{:?}", err);
}

#[test]
fn test_strategy_referencing_missing_processor() {
    let err = load_context(
        r#"
[[Queue]]
Name = "incoming"
Type = "Memory"

[[Strategy]]
Name = "main"
Type = "ParallelProcessing"
Options = { MaxThreads = 1, Queue = "incoming", Processor = "ghost" }
"#,
        &PluginRegistry::with_builtins(),
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
fn test_unknown_option_key_is_rejected() {
    let err = load_context(
        r#"
[[Queue]]
Name = "incoming"
Type = "Memory"
Options = { Mesages = ["typo"] }

[[Strategy]]
Name = "main"
Type = "ParallelProcessing"
"#,
        &PluginRegistry::with_builtins(),
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidOptions { .. }));
}

#[test]
fn test_builtin_type_names() {
    let registry = PluginRegistry::with_builtins();
    assert_eq!(
        registry.type_names(PluginKind::Strategy),
        vec!["ParallelProcessing".to_string()]
    );
    let processors = registry.type_names(PluginKind::Processor);
    assert!(processors.contains(&"Shell".to_string()));
    assert!(processors.contains(&"HTTPProxy".to_string()));
    assert!(processors.contains(&"HttpProxy".to_string()));
    assert!(registry
        .type_names(PluginKind::Queue)
        .contains(&"Sqs".to_string()));
}
