//! Construction context handed to plugin constructors

use crate::capability::{Capabilities, CapabilityRegistry};
use crate::error::PluginError;

/// Capability access for a plugin under construction
pub struct PluginContext<'a> {
    plugin: &'a str,
    requires: &'a [String],
    announces: Option<&'a str>,
    capabilities: &'a CapabilityRegistry,
    provided: Vec<String>,
}

impl<'a> PluginContext<'a> {
    pub(crate) fn new(
        plugin: &'a str,
        requires: &'a [String],
        announces: Option<&'a str>,
        capabilities: &'a CapabilityRegistry,
    ) -> Self {
        Self {
            plugin,
            requires,
            announces,
            capabilities,
            provided: Vec::new(),
        }
    }

    pub fn plugin_name(&self) -> &str {
        self.plugin
    }

    /// Resolve one capability
    pub fn require<T: Clone + Send + Sync + 'static>(&self, name: &str) -> Result<T, PluginError> {
        if !self.requires.iter().any(|r| r == name) {
            tracing::warn!(
                "Plugin {} requires '{}' without declaring it; load order is not guaranteed",
                self.plugin,
                name
            );
        }
        self.capabilities.require(name).map_err(|e| match e {
            PluginError::MissingCapability { capability, .. } => PluginError::MissingCapability {
                capability,
                required_by: Some(self.plugin.to_owned()),
            },
            other => other,
        })
    }

    /// Resolve every declared requirement
    pub fn require_all(&self) -> Result<Capabilities, PluginError> {
        self.capabilities
            .require_all(self.requires.iter().map(String::as_str))
            .map_err(|e| match e {
                PluginError::MissingCapability { capability, .. } => PluginError::MissingCapability {
                    capability,
                    required_by: Some(self.plugin.to_owned()),
                },
                other => other,
            })
    }

    /// Provide the capability this plugin announced
    pub fn provide<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> Result<(), PluginError> {
        let capability = self.announces.ok_or_else(|| PluginError::UndeclaredCapability {
            plugin: self.plugin.to_owned(),
            capability: std::any::type_name::<T>().to_owned(),
        })?;
        self.capabilities.provide(capability, self.plugin, value)?;
        self.provided.push(capability.to_owned());
        Ok(())
    }

    /// Capabilities provided through this context
    pub(crate) fn into_provided(self) -> Vec<String> {
        self.provided
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_missing_requirement_names_plugin() {
        let registry = CapabilityRegistry::new();
        let requires = vec!["IO".to_string()];
        let ctx = PluginContext::new("chat", &requires, None, &registry);

        let result = ctx.require::<Arc<u8>>("IO");
        assert!(matches!(
            result,
            Err(PluginError::MissingCapability { ref capability, required_by: Some(ref p) })
                if capability == "IO" && p == "chat"
        ));
    }

    #[test]
    fn test_provide_announced() {
        let registry = CapabilityRegistry::new();
        let mut ctx = PluginContext::new("chat", &[], Some("Chat"), &registry);

        ctx.provide(Arc::new(7u8)).unwrap();
        assert_eq!(ctx.into_provided(), vec!["Chat".to_string()]);
        assert_eq!(registry.provider("Chat").as_deref(), Some("chat"));
    }

    #[test]
    fn test_provide_without_announcement_fails() {
        let registry = CapabilityRegistry::new();
        let mut ctx = PluginContext::new("quiet", &[], None, &registry);

        assert!(matches!(
            ctx.provide(Arc::new(7u8)),
            Err(PluginError::UndeclaredCapability { .. })
        ));
        assert!(registry.is_empty());
    }
}
