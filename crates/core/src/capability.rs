//! Capability registry
//!
//! Maps a capability name to the value a plugin announced under it. Values
//! are stored type-erased and handed back as clones, so a provider typically
//! registers an `Arc<Service>` or `Arc<dyn Trait>`.

use crate::error::PluginError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
struct Capability {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    provider: String,
}

impl Capability {
    fn get<T: Clone + Send + Sync + 'static>(&self, name: &str) -> Result<T, PluginError> {
        self.value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| PluginError::CapabilityTypeMismatch {
                capability: name.to_owned(),
                expected: std::any::type_name::<T>(),
                provided: self.type_name,
            })
    }
}

/// Registry of provided capabilities, owned by a session
#[derive(Default)]
pub struct CapabilityRegistry {
    entries: DashMap<String, Capability>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` under `name`. A second provider is an error, never an
    /// overwrite.
    pub fn provide<T: Clone + Send + Sync + 'static>(
        &self,
        name: &str,
        provider: &str,
        value: T,
    ) -> Result<(), PluginError> {
        match self.entries.entry(name.to_owned()) {
            Entry::Occupied(existing) => Err(PluginError::DuplicateCapability {
                capability: name.to_owned(),
                provider: existing.get().provider.clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(Capability {
                    value: Arc::new(value),
                    type_name: std::any::type_name::<T>(),
                    provider: provider.to_owned(),
                });
                tracing::debug!("Capability '{}' provided by {}", name, provider);
                Ok(())
            }
        }
    }

    pub fn require<T: Clone + Send + Sync + 'static>(&self, name: &str) -> Result<T, PluginError> {
        let entry = self.entries.get(name).ok_or_else(|| PluginError::MissingCapability {
            capability: name.to_owned(),
            required_by: None,
        })?;
        entry.value().get(name)
    }

    /// Resolve several capabilities at once; fails on the first missing one
    pub fn require_all<'a, I>(&self, names: I) -> Result<Capabilities, PluginError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut resolved = HashMap::new();
        for name in names {
            let entry = self.entries.get(name).ok_or_else(|| PluginError::MissingCapability {
                capability: name.to_owned(),
                required_by: None,
            })?;
            resolved.insert(name.to_owned(), entry.value().clone());
        }
        Ok(Capabilities { resolved })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Name of the plugin that provided `name`
    pub fn provider(&self, name: &str) -> Option<String> {
        self.entries.get(name).map(|entry| entry.provider.clone())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove a capability provided during a load that was rolled back
    pub(crate) fn withdraw(&self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }
}

/// A resolved set of capabilities
pub struct Capabilities {
    resolved: HashMap<String, Capability>,
}

impl Capabilities {
    pub fn get<T: Clone + Send + Sync + 'static>(&self, name: &str) -> Result<T, PluginError> {
        self.resolved
            .get(name)
            .ok_or_else(|| PluginError::MissingCapability {
                capability: name.to_owned(),
                required_by: None,
            })?
            .get(name)
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}
