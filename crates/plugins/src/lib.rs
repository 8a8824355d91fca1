//! Rikerbot Plugins
//!
//! Feature plugins that ride on the rikerbot event core. Each module exposes a
//! `descriptor()` to hand to [`rikerbot::Session::load_plugins`].

pub mod chat;

// Re-export core plugin types for convenience
pub use rikerbot::{Plugin, PluginDescriptor, PluginState, SubscriptionTable};

// Re-export plugin implementations
pub use chat::{
    ChatContents, ChatCore, ChatDirection, ChatError, ChatMessage, ChatPlugin, ChatSettings, Sender,
    CHAT_CAPABILITY, CHAT_RECEIVED_EVENT,
};

/// Descriptors for every plugin in this crate
pub fn all() -> Vec<PluginDescriptor> {
    vec![chat::descriptor()]
}
