//! Packet to event routing
//!
//! Every packet type known to `rikerbot-proto` gets one event, named after the
//! packet and carrying the packet body as payload. The mapping is built once
//! when the dispatcher is created and never changes afterwards.

use crate::error::EventError;
use crate::event::{EmitReport, EventCore, EventHandle};
use proto::{Packet, PacketBody, PacketVisitor};
use std::collections::HashMap;
use std::sync::Arc;

trait Route: Send + Sync {
    fn emit(&self, events: &EventCore, packet: &Packet) -> Result<Option<EmitReport>, EventError>;
}

struct TypedRoute<P> {
    handle: EventHandle<P>,
}

impl<P: PacketBody> Route for TypedRoute<P> {
    fn emit(&self, events: &EventCore, packet: &Packet) -> Result<Option<EmitReport>, EventError> {
        match P::from_packet(packet) {
            Some(body) => events.emit(&self.handle, body).map(Some),
            None => Ok(None),
        }
    }
}

struct Registrar<'a> {
    events: &'a EventCore,
    routes: HashMap<&'static str, Box<dyn Route>>,
    error: Option<EventError>,
}

impl PacketVisitor for Registrar<'_> {
    fn visit<P: PacketBody>(&mut self) {
        if self.error.is_some() {
            return;
        }
        match self.events.register::<P>(P::NAME) {
            Ok(handle) => {
                self.routes.insert(P::NAME, Box::new(TypedRoute { handle }));
            }
            Err(e) => self.error = Some(e),
        }
    }
}

/// Routes decoded packets to their per-type events
pub struct PacketDispatcher {
    events: Arc<EventCore>,
    routes: HashMap<&'static str, Box<dyn Route>>,
}

impl PacketDispatcher {
    /// Register one event per packet type on `events`
    pub fn new(events: Arc<EventCore>) -> Result<Self, EventError> {
        let mut registrar = Registrar {
            events: &events,
            routes: HashMap::new(),
            error: None,
        };
        proto::visit_packets(&mut registrar);

        if let Some(error) = registrar.error {
            return Err(error);
        }
        let routes = registrar.routes;
        tracing::debug!("Registered {} packet events", routes.len());

        Ok(Self { events, routes })
    }

    /// Raise the event for `packet`.
    ///
    /// Returns `None` when the packet has no typed body or no route; such
    /// packets are skipped, never treated as errors.
    pub fn dispatch(&self, packet: &Packet) -> Result<Option<EmitReport>, EventError> {
        let Some(route) = packet.kind().and_then(|kind| self.routes.get(kind.name())) else {
            tracing::trace!(
                "Ignoring packet {} ({}, {}, 0x{:02X})",
                packet.name(),
                packet.state(),
                packet.direction(),
                packet.id()
            );
            return Ok(None);
        };

        route.emit(&self.events, packet)
    }

    /// Event handle for packets of type `P`
    pub fn handle<P: PacketBody>(&self) -> Result<EventHandle<P>, EventError> {
        self.events.handle::<P>(P::NAME)
    }

    pub fn is_routed(&self, name: &str) -> bool {
        self.routes.contains_key(name)
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn events(&self) -> &Arc<EventCore> {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use proto::bytes::Bytes;
    use proto::uuid::Uuid;
    use proto::{
        ChatPosition, ClientboundChat, ClientboundKeepAlive, PacketDirection, PacketKind, ProtocolState,
        UnknownPacket,
    };

    fn chat(text: &str) -> Packet {
        Packet::ClientboundChat(ClientboundChat {
            message: format!(r#"{{"text":"{text}"}}"#),
            position: ChatPosition::Chat,
            sender: Uuid::nil(),
        })
    }

    #[test]
    fn test_every_packet_kind_is_routed() {
        let dispatcher = PacketDispatcher::new(Arc::new(EventCore::new())).unwrap();

        assert_eq!(dispatcher.route_count(), PacketKind::ALL.len());
        for kind in PacketKind::ALL {
            assert!(dispatcher.is_routed(kind.name()));
            assert!(dispatcher.events().contains(kind.name()));
        }
    }

    #[test]
    fn test_dispatch_emits_typed_body() {
        let events = Arc::new(EventCore::new());
        let dispatcher = PacketDispatcher::new(Arc::clone(&events)).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        events
            .subscribe_named::<ClientboundChat, _>("ClientboundChat", "test", move |packet| {
                s.lock().push(packet.message.clone());
                Ok(())
            })
            .unwrap();

        let report = dispatcher.dispatch(&chat("one")).unwrap().unwrap();
        dispatcher.dispatch(&chat("two")).unwrap();

        assert_eq!(report.event, "ClientboundChat");
        assert_eq!(report.delivered, 1);
        assert_eq!(*seen.lock(), vec![r#"{"text":"one"}"#, r#"{"text":"two"}"#]);
    }

    #[test]
    fn test_packet_without_subscribers_is_noop() {
        let dispatcher = PacketDispatcher::new(Arc::new(EventCore::new())).unwrap();
        let packet = Packet::ClientboundKeepAlive(ClientboundKeepAlive { keep_alive_id: 7 });

        let report = dispatcher.dispatch(&packet).unwrap().unwrap();
        assert_eq!(report.invoked(), 0);
    }

    #[test]
    fn test_unknown_packet_is_ignored() {
        let dispatcher = PacketDispatcher::new(Arc::new(EventCore::new())).unwrap();
        let packet = Packet::Unknown(UnknownPacket {
            state: ProtocolState::Play,
            direction: PacketDirection::Clientbound,
            id: 0x7F,
            data: Bytes::from_static(&[1, 2, 3]),
        });

        assert!(dispatcher.dispatch(&packet).unwrap().is_none());
    }

    #[test]
    fn test_handle_matches_dispatch_event() {
        let events = Arc::new(EventCore::new());
        let dispatcher = PacketDispatcher::new(Arc::clone(&events)).unwrap();
        let handle = dispatcher.handle::<ClientboundChat>().unwrap();

        assert_eq!(events.name_of(handle.id()).as_deref(), Some("ClientboundChat"));
    }

    #[test]
    fn test_two_dispatchers_share_events() {
        let events = Arc::new(EventCore::new());
        PacketDispatcher::new(Arc::clone(&events)).unwrap();
        let second = PacketDispatcher::new(Arc::clone(&events));

        assert!(second.is_ok());
        assert_eq!(events.event_count(), PacketKind::ALL.len());
    }
}
