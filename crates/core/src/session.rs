//! A bot session: one set of registries and the plugins loaded into them

use crate::capability::CapabilityRegistry;
use crate::config::BotConfig;
use crate::dispatch::PacketDispatcher;
use crate::error::{EventError, PluginError};
use crate::event::{EmitReport, EventCore};
use crate::io::{OutboundQueue, SharedSink};
use crate::plugin::{LoaderStats, PluginDescriptor, PluginHandle, PluginLoader, PluginState};
use proto::Packet;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Capability holding the session's `Arc<EventCore>`
pub const EVENT_CAPABILITY: &str = "Event";
/// Capability holding the session's `Arc<PacketDispatcher>`
pub const DISPATCH_CAPABILITY: &str = "Dispatch";
/// Capability holding a [`SharedSink`]
pub const IO_CAPABILITY: &str = "IO";

const SESSION_PROVIDER: &str = "session";

/// Where a session is in its lifecycle. `Failed` and `Stopped` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// Accepting plugins
    Loading,
    Running,
    /// A plugin refused to start; the ones before it were shut down again
    Failed,
    Stopped,
}

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Stopped)
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loading => write!(f, "Loading"),
            Self::Running => write!(f, "Running"),
            Self::Failed => write!(f, "Failed"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Owns everything one bot connection needs. Sessions share nothing, so any
/// number of them can live in one process.
pub struct Session {
    config: BotConfig,
    events: Arc<EventCore>,
    capabilities: Arc<CapabilityRegistry>,
    dispatcher: Arc<PacketDispatcher>,
    loader: PluginLoader,
    io: Option<Arc<OutboundQueue>>,
    phase: SessionPhase,
}

impl Session {
    pub fn new(config: BotConfig) -> Result<Self, PluginError> {
        let events = Arc::new(EventCore::new());
        let capabilities = Arc::new(CapabilityRegistry::new());
        let dispatcher = Arc::new(PacketDispatcher::new(Arc::clone(&events))?);

        capabilities.provide(EVENT_CAPABILITY, SESSION_PROVIDER, Arc::clone(&events))?;
        capabilities.provide(DISPATCH_CAPABILITY, SESSION_PROVIDER, Arc::clone(&dispatcher))?;

        let loader = PluginLoader::new(Arc::clone(&events), Arc::clone(&capabilities)).with_config(&config);

        Ok(Self {
            config,
            events,
            capabilities,
            dispatcher,
            loader,
            io: None,
            phase: SessionPhase::Loading,
        })
    }

    /// Provide the `IO` capability backed by an [`OutboundQueue`] and hand
    /// back the end the network loop drains.
    pub fn attach_io(&mut self) -> Result<mpsc::UnboundedReceiver<Packet>, PluginError> {
        if let Some(provider) = self.capabilities.provider(IO_CAPABILITY) {
            return Err(PluginError::DuplicateCapability {
                capability: IO_CAPABILITY.to_owned(),
                provider,
            });
        }

        let (queue, rx) = OutboundQueue::new(Arc::clone(&self.dispatcher))?;
        let queue = Arc::new(queue);
        let sink: SharedSink = Arc::<OutboundQueue>::clone(&queue);
        self.capabilities.provide(IO_CAPABILITY, SESSION_PROVIDER, sink)?;
        self.io = Some(queue);

        Ok(rx)
    }

    /// Load a batch of plugins. Must happen before [`Session::start`].
    pub fn load_plugins(&mut self, descriptors: Vec<PluginDescriptor>) -> Result<(), PluginError> {
        match self.phase {
            SessionPhase::Loading => self.loader.load_all(descriptors),
            SessionPhase::Running => {
                let names: Vec<_> = descriptors.iter().map(|d| d.name.as_str()).collect();
                Err(EventError::RegistrySealed(names.join(", ")).into())
            }
            phase => Err(PluginError::SessionClosed(phase)),
        }
    }

    /// Seal the event registry and start plugins in load order.
    ///
    /// If a plugin fails to start, the plugins already started are shut down
    /// in reverse order and the session ends up [`SessionPhase::Failed`].
    pub fn start(&mut self) -> Result<(), PluginError> {
        match self.phase {
            SessionPhase::Loading => {}
            SessionPhase::Running => return Ok(()),
            phase => return Err(PluginError::SessionClosed(phase)),
        }

        self.events.seal();

        let handles: Vec<_> = self.loader.loaded().collect();
        for (i, handle) in handles.iter().enumerate() {
            let Some(plugin) = handle.instance() else {
                continue;
            };
            if let Err(source) = plugin.on_start() {
                tracing::error!("Plugin {} failed to start: {:#}", handle.name(), source);
                Self::shutdown_plugins(&handles[..i]);
                self.phase = SessionPhase::Failed;
                return Err(PluginError::StartFailed {
                    plugin: handle.name().to_owned(),
                    source,
                });
            }
        }
        self.phase = SessionPhase::Running;

        let stats = self.loader.get_stats();
        tracing::info!(
            "Session started with {} plugins and {} events",
            stats.loaded_plugins,
            self.events.event_count()
        );
        Ok(())
    }

    /// Raise `kill`, then shut plugins down in reverse load order. Failures
    /// are logged and do not stop the remaining plugins.
    ///
    /// Only a running session has anything to tear down. Afterwards the
    /// session is [`SessionPhase::Stopped`] and refuses further loads and
    /// starts; calling this again does nothing.
    pub fn shutdown(&mut self) {
        match self.phase {
            SessionPhase::Stopped => return,
            SessionPhase::Running => {
                if let Some(io) = &self.io {
                    if let Err(e) = io.notify_kill() {
                        tracing::error!("Failed to raise kill event: {}", e);
                    }
                }
                let handles: Vec<_> = self.loader.loaded().collect();
                Self::shutdown_plugins(&handles);
            }
            SessionPhase::Loading | SessionPhase::Failed => {}
        }

        self.events.seal();
        self.phase = SessionPhase::Stopped;
        tracing::info!("Session shut down");
    }

    fn shutdown_plugins(handles: &[&PluginHandle]) {
        for handle in handles.iter().rev() {
            if let Some(plugin) = handle.instance() {
                if let Err(e) = plugin.on_shutdown() {
                    tracing::error!("Failed to shutdown plugin {}: {:#}", handle.name(), e);
                }
            }
        }
    }

    /// Route a decoded inbound packet to its event
    pub fn dispatch(&self, packet: &Packet) -> Result<Option<EmitReport>, EventError> {
        self.dispatcher.dispatch(packet)
    }

    pub fn plugin_state(&self, name: &str) -> Option<PluginState> {
        self.loader.state(name)
    }

    pub fn load_order(&self) -> &[String] {
        self.loader.load_order()
    }

    pub fn stats(&self) -> LoaderStats {
        self.loader.get_stats()
    }

    pub fn is_started(&self) -> bool {
        self.phase == SessionPhase::Running
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn events(&self) -> &Arc<EventCore> {
        &self.events
    }

    pub fn capabilities(&self) -> &Arc<CapabilityRegistry> {
        &self.capabilities
    }

    pub fn dispatcher(&self) -> &Arc<PacketDispatcher> {
        &self.dispatcher
    }

    pub fn io(&self) -> Option<&Arc<OutboundQueue>> {
        self.io.as_ref()
    }

    pub fn loader(&self) -> &PluginLoader {
        &self.loader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{Plugin, SubscriptionTable};
    use parking_lot::Mutex;
    use proto::uuid::Uuid;
    use proto::{ChatPosition, ClientboundChat};

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        refuse_start: bool,
    }

    impl Plugin for Recorder {
        fn on_events(self: Arc<Self>, table: &mut SubscriptionTable) {
            let this = Arc::clone(&self);
            table.on_packet::<ClientboundChat, _>(move |_| {
                this.log.lock().push(format!("{} chat", this.name));
                Ok(())
            });
        }

        fn on_start(&self) -> anyhow::Result<()> {
            self.log.lock().push(format!("{} start", self.name));
            if self.refuse_start {
                anyhow::bail!("{} refuses to start", self.name);
            }
            Ok(())
        }

        fn on_shutdown(&self) -> anyhow::Result<()> {
            self.log.lock().push(format!("{} stop", self.name));
            anyhow::bail!("{} refuses to stop", self.name)
        }
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> PluginDescriptor {
        build_recorder(name, log, false)
    }

    fn stubborn(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> PluginDescriptor {
        build_recorder(name, log, true)
    }

    fn build_recorder(name: &'static str, log: &Arc<Mutex<Vec<String>>>, refuse_start: bool) -> PluginDescriptor {
        let log = Arc::clone(log);
        PluginDescriptor::new(name, move |ctx, _| {
            let _events: Arc<EventCore> = ctx.require(EVENT_CAPABILITY)?;
            Ok(Arc::new(Recorder {
                name,
                log: Arc::clone(&log),
                refuse_start,
            }))
        })
        .requires([EVENT_CAPABILITY])
    }

    #[test]
    fn test_session_provides_builtin_capabilities() {
        let mut session = Session::new(BotConfig::default()).unwrap();
        assert!(session.capabilities().contains(EVENT_CAPABILITY));
        assert!(session.capabilities().contains(DISPATCH_CAPABILITY));
        assert!(!session.capabilities().contains(IO_CAPABILITY));

        let _rx = session.attach_io().unwrap();
        assert!(session.capabilities().contains(IO_CAPABILITY));
        assert!(matches!(session.attach_io(), Err(PluginError::DuplicateCapability { .. })));
    }

    #[test]
    fn test_lifecycle_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut session = Session::new(BotConfig::default()).unwrap();
        session
            .load_plugins(vec![recorder("first", &log), recorder("second", &log)])
            .unwrap();
        session.start().unwrap();

        session
            .dispatch(&Packet::ClientboundChat(ClientboundChat {
                message: r#""hi""#.to_string(),
                position: ChatPosition::Chat,
                sender: Uuid::nil(),
            }))
            .unwrap();
        session.shutdown();

        assert_eq!(
            *log.lock(),
            vec![
                "first start",
                "second start",
                "first chat",
                "second chat",
                "second stop",
                "first stop"
            ]
        );
    }

    #[test]
    fn test_cannot_load_after_start() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut session = Session::new(BotConfig::default()).unwrap();
        session.start().unwrap();

        let result = session.load_plugins(vec![recorder("late", &log)]);
        assert!(matches!(result, Err(PluginError::Event(EventError::RegistrySealed(_)))));
        assert!(session.plugin_state("late").is_none());
    }

    #[test]
    fn test_sessions_are_independent() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut one = Session::new(BotConfig::default()).unwrap();
        let two = Session::new(BotConfig::default()).unwrap();
        one.load_plugins(vec![recorder("only_here", &log)]).unwrap();

        assert_eq!(one.plugin_state("only_here"), Some(PluginState::Loaded));
        assert!(two.plugin_state("only_here").is_none());
        assert!(two.events().subscribers_of("ClientboundChat").unwrap().is_empty());
    }

    #[test]
    fn test_first_plugin_failing_to_start_starts_nothing() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut session = Session::new(BotConfig::default()).unwrap();
        session
            .load_plugins(vec![stubborn("first", &log), recorder("second", &log)])
            .unwrap();

        let result = session.start();
        assert!(matches!(result, Err(PluginError::StartFailed { ref plugin, .. }) if plugin == "first"));
        assert_eq!(*log.lock(), vec!["first start"]);
        assert!(!session.is_started());
        assert_eq!(session.phase(), SessionPhase::Failed);

        // No silent retry
        assert!(matches!(
            session.start(),
            Err(PluginError::SessionClosed(SessionPhase::Failed))
        ));
        assert_eq!(*log.lock(), vec!["first start"]);
    }

    #[test]
    fn test_start_failure_stops_started_plugins_in_reverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut session = Session::new(BotConfig::default()).unwrap();
        session
            .load_plugins(vec![
                recorder("first", &log),
                recorder("second", &log),
                stubborn("third", &log),
                recorder("fourth", &log),
            ])
            .unwrap();

        let result = session.start();
        assert!(matches!(result, Err(PluginError::StartFailed { ref plugin, .. }) if plugin == "third"));
        assert_eq!(
            *log.lock(),
            vec!["first start", "second start", "third start", "second stop", "first stop"]
        );

        assert!(matches!(
            session.load_plugins(vec![recorder("late", &log)]),
            Err(PluginError::SessionClosed(SessionPhase::Failed))
        ));

        // Everything started was already stopped
        session.shutdown();
        assert_eq!(log.lock().len(), 5);
        assert_eq!(session.phase(), SessionPhase::Stopped);
    }

    #[test]
    fn test_shutdown_is_idempotent_and_final() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let kills = Arc::new(Mutex::new(0));
        let mut session = Session::new(BotConfig::default()).unwrap();
        let _rx = session.attach_io().unwrap();
        let k = Arc::clone(&kills);
        session
            .events()
            .subscribe_named::<(), _>(crate::io::KILL_EVENT, "test", move |_| {
                *k.lock() += 1;
                Ok(())
            })
            .unwrap();
        session.load_plugins(vec![recorder("only", &log)]).unwrap();
        session.start().unwrap();

        session.shutdown();
        session.shutdown();

        assert_eq!(*log.lock(), vec!["only start", "only stop"]);
        assert_eq!(*kills.lock(), 1);
        assert_eq!(session.phase(), SessionPhase::Stopped);
        assert!(matches!(
            session.start(),
            Err(PluginError::SessionClosed(SessionPhase::Stopped))
        ));
        assert!(matches!(
            session.load_plugins(vec![recorder("late", &log)]),
            Err(PluginError::SessionClosed(SessionPhase::Stopped))
        ));
        assert!(session.plugin_state("late").is_none());
    }

    #[test]
    fn test_shutdown_before_start_runs_no_hooks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut session = Session::new(BotConfig::default()).unwrap();
        session.load_plugins(vec![recorder("idle", &log)]).unwrap();

        session.shutdown();
        assert!(log.lock().is_empty());
        assert!(session.start().is_err());
    }
}
