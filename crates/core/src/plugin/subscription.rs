//! Explicit subscription table filled by plugins

use crate::error::EventError;
use crate::event::{EventCore, EventHandle};
use proto::PacketBody;

type Wire = Box<dyn FnOnce(&EventCore, &str) -> Result<(), EventError> + Send>;

struct Pending {
    event: String,
    wire: Wire,
}

/// The events a plugin listens to, with their handlers.
///
/// Nothing is subscribed until the loader wires the table, which happens
/// after all plugins of a load have been constructed.
#[derive(Default)]
pub struct SubscriptionTable {
    pending: Vec<Pending>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen to an event by name
    pub fn on<T, F>(&mut self, event: &str, handler: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let name = event.to_owned();
        self.pending.push(Pending {
            event: event.to_owned(),
            wire: Box::new(move |events: &EventCore, owner: &str| {
                events.subscribe_named::<T, F>(&name, owner, handler).map(drop)
            }),
        });
        self
    }

    /// Listen to an event through a handle obtained at construction
    pub fn on_handle<T, F>(&mut self, handle: EventHandle<T>, handler: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.pending.push(Pending {
            event: format!("#{}", handle.id().index()),
            wire: Box::new(move |events: &EventCore, owner: &str| events.subscribe(&handle, owner, handler)),
        });
        self
    }

    /// Listen to the event raised for packets of type `P`
    pub fn on_packet<P, F>(&mut self, handler: F) -> &mut Self
    where
        P: PacketBody,
        F: Fn(&P) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on::<P, F>(P::NAME, handler)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Event names (or `#id` for handle subscriptions) in declaration order
    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(|p| p.event.as_str())
    }

    /// Subscribe every entry, in declaration order
    pub(crate) fn wire(self, events: &EventCore, owner: &str) -> Result<usize, EventError> {
        let count = self.pending.len();
        for pending in self.pending {
            (pending.wire)(events, owner)?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use proto::{ChatPosition, ClientboundChat};
    use std::sync::Arc;

    #[test]
    fn test_wire_in_declaration_order() {
        let events = EventCore::new();
        let tick = events.register::<u32>("tick").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let mut table = SubscriptionTable::new();
        let s = Arc::clone(&seen);
        table.on::<u32, _>("tick", move |_| {
            s.lock().push("by name");
            Ok(())
        });
        let s = Arc::clone(&seen);
        table.on_handle(tick, move |_| {
            s.lock().push("by handle");
            Ok(())
        });
        assert_eq!(table.len(), 2);

        assert_eq!(table.wire(&events, "owner").unwrap(), 2);
        events.emit(&tick, &1).unwrap();
        assert_eq!(*seen.lock(), vec!["by name", "by handle"]);
    }

    #[test]
    fn test_wire_unknown_event_fails() {
        let events = EventCore::new();
        let mut table = SubscriptionTable::new();
        table.on::<u32, _>("never_registered", |_| Ok(()));

        assert!(matches!(table.wire(&events, "owner"), Err(EventError::UnknownEvent(_))));
    }

    #[test]
    fn test_on_packet_uses_packet_name() {
        let mut table = SubscriptionTable::new();
        table.on_packet::<ClientboundChat, _>(|packet| {
            assert_eq!(packet.position, ChatPosition::Chat);
            Ok(())
        });
        assert_eq!(table.events().collect::<Vec<_>>(), vec!["ClientboundChat"]);
    }
}
