//! Bot configuration
//!
//! ```toml
//! [logging]
//! level = "debug"
//!
//! [plugins.chat]
//! max_outbound_length = 100
//! ```

use crate::error::ConfigError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub logging: LoggingConfig,
    /// Settings tables keyed by plugin name
    pub plugins: HashMap<String, toml::Table>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, overridden by `RUST_LOG`
    pub level: String,
    pub ansi: bool,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
            json: false,
        }
    }
}

impl BotConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&raw)
    }

    /// Settings for one plugin, empty if the config has no table for it
    pub fn plugin_settings(&self, plugin: &str) -> PluginSettings {
        PluginSettings {
            plugin: plugin.to_owned(),
            table: self.plugins.get(plugin).cloned().unwrap_or_default(),
        }
    }
}

/// A plugin's raw settings table
#[derive(Debug, Clone, Default)]
pub struct PluginSettings {
    plugin: String,
    table: toml::Table,
}

impl PluginSettings {
    pub fn new(plugin: impl Into<String>, table: toml::Table) -> Self {
        Self {
            plugin: plugin.into(),
            table,
        }
    }

    /// Empty settings; every field falls back to its serde default
    pub fn empty(plugin: impl Into<String>) -> Self {
        Self::new(plugin, toml::Table::new())
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn raw(&self) -> &toml::Table {
        &self.table
    }

    /// Deserialize into the plugin's own settings type
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        toml::Value::Table(self.table.clone())
            .try_into()
            .map_err(|source| ConfigError::InvalidSettings {
                plugin: self.plugin.clone(),
                source,
            })
    }
}
