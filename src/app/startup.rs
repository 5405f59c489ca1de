//! Process startup: arguments, configuration, logging, plugin loading and
//! the control loop

use super::cli::Args;
use super::lifecycle::EngineLifecycle;
use crate::config::{Config, ConfigError};
use crate::core::context::Context;
use crate::core::control::{control_channel, Dispatcher};
use crate::core::error_handling::{fatal_message, log_error_with_context};
use crate::core::exit::ExitCode;
use crate::core::logging::{flush_logging, init_logging, validate_level};
use crate::core::signals::SignalBridge;
use crate::core::version::long_version;
use crate::plugin::PluginRegistry;
use clap::Parser;
use std::sync::Arc;

/// Parse arguments, run the engine and exit with its code
pub fn startup() -> ! {
    let args = Args::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("FATAL: can't start async runtime: {}", e);
            ExitCode::RuntimeError.exit()
        }
    };

    let code = runtime.block_on(run(args));
    flush_logging();
    code.exit()
}

/// Everything between argument parsing and process exit
pub async fn run(args: Args) -> ExitCode {
    let Some(config_path) = args.config_path() else {
        eprintln!("FATAL: no configuration file given and no config directory found");
        return ExitCode::Misconfiguration;
    };

    let config = match Config::load(&config_path).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {}", fatal_message(&e, "Reading configuration"));
            return ExitCode::Misconfiguration;
        }
    };

    let level = args.effective_log_level(&config.general.log_level);
    if !validate_level(&level) {
        let e = ConfigError::InvalidLogLevel { level };
        eprintln!("FATAL: {}", fatal_message(&e, "Configuring logging"));
        return ExitCode::Misconfiguration;
    }
    if let Err(e) = init_logging(
        &level,
        args.log_format.as_deref(),
        args.log_file.as_deref(),
        args.use_color(),
    ) {
        eprintln!("FATAL: can't initialise logging: {}", e);
        return ExitCode::Misconfiguration;
    }

    log::info!("qp {} starting with {}", long_version(), config_path.display());

    let shutdown_timeout = args.shutdown_timeout(config.general.shutdown_timeout());
    let registry = PluginRegistry::with_builtins();
    log::debug!("Available plugins: {:?}", registry);

    let (control, receiver) = control_channel();
    let context = match Context::load(config, &registry, control.clone()) {
        Ok(context) => Arc::new(context),
        Err(e) => {
            log_error_with_context(&e, "Loading configuration");
            return ExitCode::Misconfiguration;
        }
    };

    if let Err(e) = SignalBridge::new(control.clone(), shutdown_timeout).install() {
        log::error!("FATAL: can't install signal handlers: {}", e);
        return ExitCode::RuntimeError;
    }

    let dispatcher = Dispatcher::new(context, Arc::new(EngineLifecycle), receiver);
    tokio::spawn(async move {
        if let Err(e) = control.send_run().await {
            log::error!("{}", e);
        }
    });

    dispatcher.run().await
}
