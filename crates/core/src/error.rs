//! Error types for the event core, plugin loader and configuration

use crate::plugin::PluginState;
use crate::session::SessionPhase;
use thiserror::Error;

/// Errors raised by the event registry
#[derive(Debug, Error)]
pub enum EventError {
    /// The name is taken by an event carrying a different payload type
    #[error("Event '{event}' is already registered with payload {registered}, not {requested}")]
    DuplicateEventName {
        event: String,
        registered: &'static str,
        requested: &'static str,
    },

    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    /// Registration or subscription attempted after the session started
    #[error("Event registry is sealed, cannot modify '{0}'")]
    RegistrySealed(String),
}

/// A subscriber that failed while handling an emission.
///
/// Never propagated out of `emit`; collected into the emit report instead.
#[derive(Debug, Clone, Error)]
#[error("Handler of plugin '{plugin}' failed on event '{event}': {message}")]
pub struct HandlerExecutionError {
    pub plugin: String,
    pub event: String,
    pub message: String,
    /// The handler panicked rather than returning an error
    pub panicked: bool,
}

/// Load-time errors. All of them are fatal to session startup.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Capability '{capability}' is already provided by '{provider}'")]
    DuplicateCapability { capability: String, provider: String },

    #[error("Missing capability '{capability}'{}", required_by.as_ref().map(|p| format!(" required by plugin '{p}'")).unwrap_or_default())]
    MissingCapability {
        capability: String,
        required_by: Option<String>,
    },

    #[error("Capability '{capability}' holds {provided}, requested as {expected}")]
    CapabilityTypeMismatch {
        capability: String,
        expected: &'static str,
        provided: &'static str,
    },

    #[error("Plugin '{plugin}' provides '{capability}' without announcing it")]
    UndeclaredCapability { plugin: String, capability: String },

    #[error("Cyclic dependency between plugins: {}", plugins.join(" -> "))]
    CyclicDependency { plugins: Vec<String> },

    #[error("Plugin '{0}' is already registered")]
    DuplicatePlugin(String),

    #[error("Plugin '{plugin}' failed to construct: {source:#}")]
    ConstructionFailed {
        plugin: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Plugin '{plugin}' failed to start: {source:#}")]
    StartFailed {
        plugin: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Plugin '{plugin}' cannot transition from {from} to {to}")]
    InvalidTransition {
        plugin: String,
        from: PluginState,
        to: PluginState,
    },

    /// The session already failed to start or was shut down
    #[error("Session is {0}, it cannot load or start plugins")]
    SessionClosed(SessionPhase),

    #[error("Event error: {0}")]
    Event(#[from] EventError),
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid settings for plugin '{plugin}': {source}")]
    InvalidSettings {
        plugin: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to initialise logging: {0}")]
    Logging(String),
}
