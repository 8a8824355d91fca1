//! Core plugin trait and descriptor

use super::{PluginContext, SubscriptionTable};
use crate::config::PluginSettings;
use anyhow::Result;
use std::sync::Arc;

/// Trait implemented by every constructed plugin instance
pub trait Plugin: Send + Sync + 'static {
    /// Declare event subscriptions.
    ///
    /// Called once per plugin after every plugin of the load has been
    /// constructed, so events registered by any constructor are visible
    /// here. The loader wires the table into the event registry with this
    /// plugin as the owner.
    fn on_events(self: Arc<Self>, _table: &mut SubscriptionTable) {}

    /// Called when the session starts, in load order
    fn on_start(&self) -> Result<()> {
        Ok(())
    }

    /// Called when the session shuts down, in reverse load order
    fn on_shutdown(&self) -> Result<()> {
        Ok(())
    }
}

type Constructor =
    Box<dyn Fn(&mut PluginContext<'_>, &PluginSettings) -> Result<Arc<dyn Plugin>> + Send + Sync>;

/// Static description of a plugin: identity, dependencies and constructor
pub struct PluginDescriptor {
    /// Plugin name (must be unique)
    pub name: String,
    pub version: semver::Version,
    pub description: String,
    /// Capability names this plugin needs, in declaration order
    pub requires: Vec<String>,
    /// Capability this plugin provides once constructed
    pub announces: Option<String>,
    constructor: Constructor,
}

impl PluginDescriptor {
    /// Create a descriptor from a constructor
    pub fn new<P, F>(name: impl Into<String>, constructor: F) -> Self
    where
        P: Plugin,
        F: Fn(&mut PluginContext<'_>, &PluginSettings) -> Result<Arc<P>> + Send + Sync + 'static,
    {
        let constructor: Constructor =
            Box::new(move |ctx: &mut PluginContext<'_>, settings: &PluginSettings| {
                let plugin: Arc<dyn Plugin> = constructor(ctx, settings)?;
                Ok(plugin)
            });

        Self {
            name: name.into(),
            version: semver::Version::new(0, 1, 0),
            description: String::new(),
            requires: Vec::new(),
            announces: None,
            constructor,
        }
    }

    pub fn with_version(mut self, version: semver::Version) -> Self {
        self.version = version;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add required capabilities
    pub fn requires<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires.extend(names.into_iter().map(Into::into));
        self
    }

    /// Set the capability this plugin provides
    pub fn announces(mut self, capability: impl Into<String>) -> Self {
        self.announces = Some(capability.into());
        self
    }

    pub(crate) fn construct(
        &self,
        ctx: &mut PluginContext<'_>,
        settings: &PluginSettings,
    ) -> Result<Arc<dyn Plugin>> {
        (self.constructor)(ctx, settings)
    }
}

impl std::fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("requires", &self.requires)
            .field("announces", &self.announces)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Empty;

    impl Plugin for Empty {}

    #[test]
    fn test_descriptor_builder() {
        let descriptor = PluginDescriptor::new("chat", |_, _| Ok(Arc::new(Empty)))
            .with_version(semver::Version::new(1, 2, 0))
            .requires(["Event", "IO"])
            .announces("Chat");

        assert_eq!(descriptor.name, "chat");
        assert_eq!(descriptor.version.to_string(), "1.2.0");
        assert_eq!(descriptor.requires, vec!["Event".to_string(), "IO".to_string()]);
        assert_eq!(descriptor.announces.as_deref(), Some("Chat"));
    }

    #[test]
    fn test_default_hooks_succeed() {
        let plugin = Empty;
        assert!(plugin.on_start().is_ok());
        assert!(plugin.on_shutdown().is_ok());
    }
}
