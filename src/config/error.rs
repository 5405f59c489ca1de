//! Configuration Error Types

use crate::core::error_handling::ContextualError;
use crate::plugin::PluginKind;
use std::path::PathBuf;

/// Errors detected while loading configuration or wiring plugins.
///
/// Every variant is fatal at load time: the process exits with the
/// misconfiguration code before any message is consumed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Can't read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Can't parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Unknown {kind} type requested: {type_name}")]
    UnknownPluginType { kind: PluginKind, type_name: String },

    #[error("Unknown {kind} requested: {name}")]
    UnknownReference { kind: PluginKind, name: String },

    #[error("Duplicate {kind} name: {name}")]
    DuplicateName { kind: PluginKind, name: String },

    #[error("There should be exactly one Strategy configured, found {found}")]
    StrategyCount { found: usize },

    #[error("Invalid options for {plugin}: {message}")]
    InvalidOptions { plugin: String, message: String },

    #[error("Wrong log level [{level}]")]
    InvalidLogLevel { level: String },
}

impl ConfigError {
    pub fn invalid_options(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidOptions {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}

impl ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        // A read failure may be permissions or disk trouble rather than a typo
        !matches!(self, ConfigError::Read { .. })
    }

    fn user_message(&self) -> Option<String> {
        if self.is_user_actionable() {
            Some(self.to_string())
        } else {
            None
        }
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
