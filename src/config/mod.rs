//! Engine configuration
//!
//! The configuration file is TOML with one array of tables per plugin kind.
//! Each entry carries a logical `Name`, a plugin `Type` and an open `Options`
//! table which is handed verbatim to the plugin; every plugin deserializes
//! its options into its own typed schema via [`parse_options`].
//!
//! ```toml
//! [General]
//! LogLevel = "info"
//! ShutdownTimeout = 30
//!
//! [[Queue]]
//! Name = "incoming"
//! Type = "Tail"
//! Options = { Path = "/var/log/app.log" }
//!
//! [[Processor]]
//! Name = "printer"
//! Type = "Stdout"
//!
//! [[Strategy]]
//! Name = "main"
//! Type = "ParallelProcessing"
//! Options = { MaxThreads = 4, Queue = "incoming", Processor = "printer" }
//! ```

mod error;

pub use error::{ConfigError, ConfigResult};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Open key/value options passed to a plugin's `configure`
pub type Options = toml::Table;

/// Escalation window used when neither the CLI nor the config file sets one
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// One `{Name, Type, Options}` entry of a plugin section
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct PluginSection {
    pub name: String,
    #[serde(rename = "Type")]
    pub plugin_type: String,
    #[serde(default)]
    pub options: Options,
}

/// Settings that belong to the engine rather than to a plugin
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct General {
    #[serde(default = "General::default_log_level")]
    pub log_level: String,
    /// Seconds a graceful shutdown may take before it is forced
    #[serde(default = "General::default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

impl General {
    fn default_log_level() -> String {
        "warn".to_string()
    }

    fn default_shutdown_timeout() -> u64 {
        DEFAULT_SHUTDOWN_TIMEOUT_SECS
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }
}

impl Default for General {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            shutdown_timeout: Self::default_shutdown_timeout(),
        }
    }
}

/// Parsed configuration file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub general: General,
    #[serde(default)]
    pub queue: Vec<PluginSection>,
    #[serde(default)]
    pub processor: Vec<PluginSection>,
    #[serde(default)]
    pub strategy: Vec<PluginSection>,
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str, origin: &Path) -> ConfigResult<Self> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Read and parse a configuration file
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml_str(&contents, path)
    }

    /// The single strategy entry the engine runs
    pub fn strategy_section(&self) -> ConfigResult<&PluginSection> {
        match self.strategy.as_slice() {
            [only] => Ok(only),
            other => Err(ConfigError::StrategyCount { found: other.len() }),
        }
    }
}

/// Deserialize a plugin's options into its typed schema.
///
/// Unknown keys and mismatched value types are rejected as
/// [`ConfigError::InvalidOptions`] provided the schema uses
/// `#[serde(deny_unknown_fields)]`.
pub fn parse_options<T: DeserializeOwned>(plugin: &str, options: &Options) -> ConfigResult<T> {
    toml::Value::Table(options.clone())
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::invalid_options(plugin, e.message()))
}
