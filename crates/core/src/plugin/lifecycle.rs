//! Plugin lifecycle tracking

use super::{Plugin, PluginDescriptor};
use crate::error::PluginError;
use std::sync::Arc;
use std::time::Instant;

/// Plugin state during a load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginState {
    /// Descriptor accepted, nothing resolved yet
    Discovered,
    /// Dependencies being resolved and the plugin constructed
    Resolving,
    /// Constructed and subscribed
    Loaded,
    /// The load this plugin was part of failed
    Failed,
}

impl PluginState {
    pub fn is_loaded(self) -> bool {
        matches!(self, Self::Loaded)
    }

    pub fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Get the next valid states from the current state
    pub fn valid_transitions(self) -> &'static [PluginState] {
        match self {
            Self::Discovered => &[Self::Resolving, Self::Failed],
            Self::Resolving => &[Self::Loaded, Self::Failed],
            Self::Loaded | Self::Failed => &[],
        }
    }

    pub fn can_transition_to(self, target: PluginState) -> bool {
        self.valid_transitions().contains(&target)
    }
}

impl std::fmt::Display for PluginState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discovered => write!(f, "Discovered"),
            Self::Resolving => write!(f, "Resolving"),
            Self::Loaded => write!(f, "Loaded"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Loader-side record of one plugin
pub struct PluginHandle {
    pub name: String,
    pub version: semver::Version,
    pub requires: Vec<String>,
    pub announces: Option<String>,
    state: PluginState,
    instance: Option<Arc<dyn Plugin>>,
    subscriptions: usize,
    last_state_change: Instant,
}

impl PluginHandle {
    pub(crate) fn new(descriptor: &PluginDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            requires: descriptor.requires.clone(),
            announces: descriptor.announces.clone(),
            state: PluginState::Discovered,
            instance: None,
            subscriptions: 0,
            last_state_change: Instant::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> PluginState {
        self.state
    }

    pub fn instance(&self) -> Option<&Arc<dyn Plugin>> {
        self.instance.as_ref()
    }

    /// Number of event subscriptions wired for this plugin
    pub fn subscriptions(&self) -> usize {
        self.subscriptions
    }

    pub fn last_state_change(&self) -> Instant {
        self.last_state_change
    }

    pub(crate) fn set_loaded(&mut self, instance: Arc<dyn Plugin>, subscriptions: usize) -> Result<(), PluginError> {
        self.set_state(PluginState::Loaded)?;
        self.instance = Some(instance);
        self.subscriptions = subscriptions;
        Ok(())
    }

    /// Move to `Failed` and drop any instance. No-op if already failed.
    pub(crate) fn fail(&mut self) {
        if self.state.can_transition_to(PluginState::Failed) {
            tracing::debug!("Plugin {} state: {} -> {}", self.name, self.state, PluginState::Failed);
            self.state = PluginState::Failed;
            self.last_state_change = Instant::now();
        }
        self.instance = None;
        self.subscriptions = 0;
    }

    /// Set plugin state with validation
    pub(crate) fn set_state(&mut self, new_state: PluginState) -> Result<(), PluginError> {
        if !self.state.can_transition_to(new_state) {
            return Err(PluginError::InvalidTransition {
                plugin: self.name.clone(),
                from: self.state,
                to: new_state,
            });
        }

        tracing::debug!("Plugin {} state: {} -> {}", self.name, self.state, new_state);
        self.state = new_state;
        self.last_state_change = Instant::now();
        Ok(())
    }
}

impl std::fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHandle")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("state", &self.state)
            .field("subscriptions", &self.subscriptions)
            .finish_non_exhaustive()
    }
}
