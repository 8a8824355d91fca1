//! Plugin system for rikerbot
//!
//! A plugin is described by a [`PluginDescriptor`]: its name, the
//! capabilities it requires, the capability it announces, and a constructor.
//! The [`PluginLoader`] orders descriptors by their requirements, constructs
//! each plugin exactly once and wires the event subscriptions each plugin
//! declares through [`Plugin::on_events`].

pub mod context;
pub mod lifecycle;
pub mod loader;
pub mod plugin;
pub mod subscription;

pub use context::PluginContext;
pub use lifecycle::{PluginHandle, PluginState};
pub use loader::{LoaderStats, PluginLoader};
pub use plugin::{Plugin, PluginDescriptor};
pub use subscription::SubscriptionTable;
