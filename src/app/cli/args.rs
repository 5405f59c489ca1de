//! Command line arguments
//!
//! CLI values override the `[General]` section of the configuration file.

use crate::core::logging::LOG_LEVELS;
use crate::core::version;
use clap::{ArgAction, Parser};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

/// File looked up under the user's config directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "qp/config.toml";

#[derive(Parser, Debug, Clone)]
#[command(name = "qp")]
#[command(about = "Pull messages from a queue and run them through a processor")]
#[command(version = version::version(), long_version = version::long_version())]
pub struct Args {
    /// Configuration file (defaults to <config dir>/qp/config.toml)
    #[arg(value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Log level, overrides verbosity and the configuration file
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = LOG_LEVELS)]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Force colored log output
    #[arg(long = "color", conflicts_with = "no_color")]
    pub color: bool,

    /// Disable colored log output
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Seconds a graceful shutdown may take before it is forced
    #[arg(short = 't', long = "shutdown-timeout", value_name = "SECONDS")]
    pub shutdown_timeout: Option<u64>,
}

impl Args {
    /// Configuration path from the command line or the user's config directory
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config
            .clone()
            .or_else(|| dirs::config_dir().map(|dir| dir.join(DEFAULT_CONFIG_FILE)))
    }

    /// `--log-level`, then `-v` count, then the configured level
    pub fn effective_log_level(&self, configured: &str) -> String {
        if let Some(level) = &self.log_level {
            return level.clone();
        }
        match self.verbose {
            0 => configured.to_string(),
            1 => "info".to_string(),
            2 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    }

    /// Colors only when forced or when stderr is a terminal, and never to a file
    pub fn use_color(&self) -> bool {
        if self.no_color || self.log_file.is_some() {
            return false;
        }
        self.color || std::io::stderr().is_terminal()
    }

    pub fn shutdown_timeout(&self, configured: Duration) -> Duration {
        self.shutdown_timeout
            .map(Duration::from_secs)
            .unwrap_or(configured)
    }
}
