//! Plugin loader and event core for rikerbot
//!
//! A [`Session`] owns an [`EventCore`], a [`CapabilityRegistry`] and a
//! [`PacketDispatcher`]. Plugins are loaded into it from
//! [`PluginDescriptor`]s: the loader orders them by the capabilities they
//! require, constructs each one once, and wires the event subscriptions each
//! plugin declares. Decoded packets handed to [`Session::dispatch`] are raised
//! as one typed event per packet type.

#![warn(
    clippy::expect_used,
    clippy::get_unwrap,
    clippy::if_then_some_else_none,
    clippy::let_underscore_untyped,
    clippy::unwrap_in_result,
    clippy::unwrap_used,
    clippy::str_to_string,
    clippy::clone_on_ref_ptr,
    clippy::default_trait_access,
    clippy::explicit_iter_loop,
    clippy::implicit_clone,
    clippy::manual_let_else,
    clippy::match_bool,
    clippy::redundant_closure_for_method_calls,
    clippy::trivially_copy_pass_by_ref,
    clippy::unused_self
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod capability;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod io;
pub mod logging;
pub mod plugin;
pub mod session;

pub use proto;

pub use capability::{Capabilities, CapabilityRegistry};
pub use config::{BotConfig, LoggingConfig, PluginSettings};
pub use dispatch::PacketDispatcher;
pub use error::{ConfigError, EventError, HandlerExecutionError, PluginError};
pub use event::{EmitReport, EventCore, EventHandle, EventId};
pub use io::{ConnectData, OutboundQueue, PacketSink, SharedSink, IO_CONNECT_EVENT, KILL_EVENT};
pub use plugin::{
    LoaderStats, Plugin, PluginContext, PluginDescriptor, PluginHandle, PluginLoader, PluginState,
    SubscriptionTable,
};
pub use session::{Session, SessionPhase, DISPATCH_CAPABILITY, EVENT_CAPABILITY, IO_CAPABILITY};
