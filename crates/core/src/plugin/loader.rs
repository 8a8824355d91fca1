//! Plugin loader: dependency ordering, construction and subscription wiring

use super::{Plugin, PluginContext, PluginDescriptor, PluginHandle, PluginState, SubscriptionTable};
use crate::capability::CapabilityRegistry;
use crate::config::{BotConfig, PluginSettings};
use crate::error::PluginError;
use crate::event::EventCore;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Loads plugin descriptors into a session's registries
pub struct PluginLoader {
    events: Arc<EventCore>,
    capabilities: Arc<CapabilityRegistry>,
    settings: HashMap<String, PluginSettings>,
    /// Every plugin seen by this loader, including failed ones
    plugins: HashMap<String, PluginHandle>,
    /// Successfully loaded plugins in construction order
    load_order: Vec<String>,
}

impl PluginLoader {
    pub fn new(events: Arc<EventCore>, capabilities: Arc<CapabilityRegistry>) -> Self {
        Self {
            events,
            capabilities,
            settings: HashMap::new(),
            plugins: HashMap::new(),
            load_order: Vec::new(),
        }
    }

    /// Take per-plugin settings from the bot configuration
    pub fn with_config(mut self, config: &BotConfig) -> Self {
        for name in config.plugins.keys() {
            self.settings.insert(name.clone(), config.plugin_settings(name));
        }
        self
    }

    pub fn set_settings(&mut self, settings: PluginSettings) {
        self.settings.insert(settings.plugin().to_owned(), settings);
    }

    /// Load a set of plugins.
    ///
    /// Either every descriptor ends up `Loaded` or the call fails and every
    /// descriptor of this call ends up `Failed`, with any capability they
    /// provided withdrawn and no subscription left behind.
    pub fn load_all(&mut self, descriptors: Vec<PluginDescriptor>) -> Result<(), PluginError> {
        let mut seen = HashSet::new();
        for descriptor in &descriptors {
            if self.plugins.contains_key(&descriptor.name) || !seen.insert(descriptor.name.as_str()) {
                return Err(PluginError::DuplicatePlugin(descriptor.name.clone()));
            }
        }

        let batch: Vec<String> = descriptors.iter().map(|d| d.name.clone()).collect();
        for descriptor in &descriptors {
            tracing::debug!("Discovered plugin: {} v{}", descriptor.name, descriptor.version);
            self.plugins.insert(descriptor.name.clone(), PluginHandle::new(descriptor));
        }

        match self.load_batch(&descriptors) {
            Ok(loaded) => {
                tracing::info!("Loaded {} plugins: {}", loaded.len(), loaded.join(", "));
                Ok(())
            }
            Err((error, provided)) => {
                tracing::error!("Plugin load failed: {}", error);
                self.rollback(&batch, &provided);
                Err(error)
            }
        }
    }

    /// Resolve, construct and wire one batch. On failure returns the error
    /// together with the capabilities provided so far.
    fn load_batch(&mut self, descriptors: &[PluginDescriptor]) -> Result<Vec<String>, (PluginError, Vec<String>)> {
        for descriptor in descriptors {
            self.transition(&descriptor.name, PluginState::Resolving)
                .map_err(|e| (e, Vec::new()))?;
        }

        let order = self.resolve_order(descriptors).map_err(|e| (e, Vec::new()))?;
        let capabilities = Arc::clone(&self.capabilities);
        let mut provided = Vec::new();
        let mut constructed: Vec<(usize, Arc<dyn Plugin>)> = Vec::with_capacity(order.len());

        for &index in &order {
            let descriptor = &descriptors[index];
            let settings = self
                .settings
                .get(&descriptor.name)
                .cloned()
                .unwrap_or_else(|| PluginSettings::empty(&descriptor.name));

            let mut ctx = PluginContext::new(
                &descriptor.name,
                &descriptor.requires,
                descriptor.announces.as_deref(),
                &capabilities,
            );
            let result = descriptor.construct(&mut ctx, &settings);
            provided.extend(ctx.into_provided());

            let plugin = match result {
                Ok(plugin) => plugin,
                Err(source) => {
                    return Err((
                        PluginError::ConstructionFailed {
                            plugin: descriptor.name.clone(),
                            source,
                        },
                        provided,
                    ))
                }
            };

            if let Some(capability) = &descriptor.announces {
                if !capabilities.contains(capability) {
                    return Err((
                        PluginError::ConstructionFailed {
                            plugin: descriptor.name.clone(),
                            source: anyhow::anyhow!("announced capability '{}' was not provided", capability),
                        },
                        provided,
                    ));
                }
            }

            tracing::debug!("Constructed plugin: {}", descriptor.name);
            constructed.push((index, plugin));
        }

        let mut wired = Vec::with_capacity(constructed.len());
        for (index, plugin) in &constructed {
            let name = &descriptors[*index].name;
            let mut table = SubscriptionTable::new();
            Arc::clone(plugin).on_events(&mut table);
            match table.wire(&self.events, name) {
                Ok(count) => wired.push(count),
                Err(e) => return Err((e.into(), provided)),
            }
        }

        let mut loaded = Vec::with_capacity(constructed.len());
        for ((index, plugin), subscriptions) in constructed.into_iter().zip(wired) {
            let descriptor = &descriptors[index];
            if let Some(handle) = self.plugins.get_mut(&descriptor.name) {
                handle.set_loaded(plugin, subscriptions).map_err(|e| (e, provided.clone()))?;
            }
            tracing::info!("Loaded plugin: {} v{}", descriptor.name, descriptor.version);
            self.load_order.push(descriptor.name.clone());
            loaded.push(descriptor.name.clone());
        }

        Ok(loaded)
    }

    /// Compute construction order from `requires` edges.
    ///
    /// An edge runs from a plugin to the plugin announcing a capability it
    /// requires. Requirements already present in the capability registry add
    /// no edge.
    fn resolve_order(&self, descriptors: &[PluginDescriptor]) -> Result<Vec<usize>, PluginError> {
        let mut providers: HashMap<&str, usize> = HashMap::new();
        for (index, descriptor) in descriptors.iter().enumerate() {
            let Some(capability) = descriptor.announces.as_deref() else {
                continue;
            };
            if let Some(provider) = self.capabilities.provider(capability) {
                return Err(PluginError::DuplicateCapability {
                    capability: capability.to_owned(),
                    provider,
                });
            }
            if let Some(&other) = providers.get(capability) {
                return Err(PluginError::DuplicateCapability {
                    capability: capability.to_owned(),
                    provider: descriptors[other].name.clone(),
                });
            }
            providers.insert(capability, index);
        }

        let mut edges = vec![Vec::new(); descriptors.len()];
        for (index, descriptor) in descriptors.iter().enumerate() {
            for requirement in &descriptor.requires {
                if let Some(&provider) = providers.get(requirement.as_str()) {
                    edges[index].push(provider);
                } else if !self.capabilities.contains(requirement) {
                    return Err(PluginError::MissingCapability {
                        capability: requirement.clone(),
                        required_by: Some(descriptor.name.clone()),
                    });
                }
            }
        }

        let mut order = Vec::with_capacity(descriptors.len());
        let mut visited = vec![false; descriptors.len()];
        let mut path = Vec::new();
        for index in 0..descriptors.len() {
            Self::visit_plugin(index, descriptors, &edges, &mut order, &mut visited, &mut path)?;
        }

        Ok(order)
    }

    /// Depth-first topological visit. `path` holds the current chain so a
    /// cycle can be reported with all of its members.
    fn visit_plugin(
        index: usize,
        descriptors: &[PluginDescriptor],
        edges: &[Vec<usize>],
        order: &mut Vec<usize>,
        visited: &mut [bool],
        path: &mut Vec<usize>,
    ) -> Result<(), PluginError> {
        if let Some(start) = path.iter().position(|&p| p == index) {
            return Err(PluginError::CyclicDependency {
                plugins: path[start..].iter().map(|&p| descriptors[p].name.clone()).collect(),
            });
        }

        if visited[index] {
            return Ok(());
        }

        path.push(index);
        for &dependency in &edges[index] {
            Self::visit_plugin(dependency, descriptors, edges, order, visited, path)?;
        }
        path.pop();

        visited[index] = true;
        order.push(index);
        Ok(())
    }

    fn transition(&mut self, name: &str, state: PluginState) -> Result<(), PluginError> {
        match self.plugins.get_mut(name) {
            Some(handle) => handle.set_state(state),
            None => Ok(()),
        }
    }

    fn rollback(&mut self, batch: &[String], provided: &[String]) {
        for capability in provided {
            if self.capabilities.withdraw(capability) {
                tracing::debug!("Withdrew capability '{}'", capability);
            }
        }
        for name in batch {
            let removed = self.events.unsubscribe_owner(name);
            if removed > 0 {
                tracing::debug!("Removed {} subscriptions of plugin {}", removed, name);
            }
            if let Some(handle) = self.plugins.get_mut(name) {
                handle.fail();
            }
        }
        self.load_order.retain(|name| !batch.contains(name));
    }

    pub fn state(&self, name: &str) -> Option<PluginState> {
        self.plugins.get(name).map(PluginHandle::state)
    }

    pub fn handle(&self, name: &str) -> Option<&PluginHandle> {
        self.plugins.get(name)
    }

    /// Loaded plugin instance
    pub fn plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(name).and_then(|h| h.instance().cloned())
    }

    /// Names of loaded plugins in construction order
    pub fn load_order(&self) -> &[String] {
        &self.load_order
    }

    /// Loaded plugins in construction order
    pub fn loaded(&self) -> impl Iterator<Item = &PluginHandle> {
        self.load_order.iter().filter_map(|name| self.plugins.get(name))
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.state(name).is_some_and(PluginState::is_loaded)
    }

    pub fn get_stats(&self) -> LoaderStats {
        let mut stats = LoaderStats {
            total_plugins: self.plugins.len(),
            ..LoaderStats::default()
        };

        for handle in self.plugins.values() {
            match handle.state() {
                PluginState::Discovered => stats.discovered_plugins += 1,
                PluginState::Resolving => stats.resolving_plugins += 1,
                PluginState::Loaded => stats.loaded_plugins += 1,
                PluginState::Failed => stats.failed_plugins += 1,
            }
        }

        stats
    }
}

/// Plugin loader statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoaderStats {
    pub total_plugins: usize,
    pub discovered_plugins: usize,
    pub resolving_plugins: usize,
    pub loaded_plugins: usize,
    pub failed_plugins: usize,
}
