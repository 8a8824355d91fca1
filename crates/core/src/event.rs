//! Named, typed event registry
//!
//! Events are identified by name and carry a payload type fixed at
//! registration. Callers get an [`EventHandle<T>`] back, so after
//! registration neither emitting nor subscribing needs the raw name and the
//! payload type is checked by the compiler.
//!
//! Emission is synchronous: every subscriber runs on the calling thread, in
//! subscription order, before `emit` returns. A subscriber that returns an
//! error or panics is reported and skipped; the remaining subscribers still
//! run.

use crate::error::{EventError, HandlerExecutionError};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Index of an event inside its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(usize);

impl EventId {
    pub fn index(self) -> usize {
        self.0
    }
}

static NEXT_REGISTRY: AtomicU64 = AtomicU64::new(1);

/// Typed handle to a registered event. Only valid on the registry that
/// issued it.
pub struct EventHandle<T> {
    registry: u64,
    id: EventId,
    _payload: PhantomData<fn(&T)>,
}

impl<T> EventHandle<T> {
    fn new(registry: u64, id: EventId) -> Self {
        Self {
            registry,
            id,
            _payload: PhantomData,
        }
    }

    pub fn id(&self) -> EventId {
        self.id
    }
}

impl<T> Clone for EventHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for EventHandle<T> {}

impl<T> PartialEq for EventHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.registry == other.registry && self.id == other.id
    }
}

impl<T> Eq for EventHandle<T> {}

impl<T> std::fmt::Debug for EventHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandle")
            .field("registry", &self.registry)
            .field("id", &self.id.0)
            .field("payload", &std::any::type_name::<T>())
            .finish()
    }
}

type ErasedHandler = dyn Fn(&(dyn Any + Send + Sync)) -> anyhow::Result<()> + Send + Sync;

#[derive(Clone)]
struct Subscriber {
    owner: Arc<str>,
    handler: Arc<ErasedHandler>,
}

struct EventSlot {
    name: Arc<str>,
    payload: TypeId,
    payload_name: &'static str,
    /// Copy-on-write so emission can run without holding the registry lock
    subscribers: Arc<Vec<Subscriber>>,
}

#[derive(Default)]
struct EventTable {
    slots: Vec<EventSlot>,
    by_name: HashMap<Arc<str>, EventId>,
}

/// Outcome of a single emission
#[derive(Debug, Clone, Default)]
pub struct EmitReport {
    pub event: String,
    /// Subscribers that completed successfully
    pub delivered: usize,
    pub failures: Vec<HandlerExecutionError>,
}

impl EmitReport {
    /// Total subscribers invoked
    pub fn invoked(&self) -> usize {
        self.delivered + self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Registry of named events and their subscribers
pub struct EventCore {
    id: u64,
    table: RwLock<EventTable>,
    sealed: AtomicBool,
}

impl EventCore {
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY.fetch_add(1, Ordering::Relaxed),
            table: RwLock::new(EventTable::default()),
            sealed: AtomicBool::new(false),
        }
    }

    /// Register an event, or fetch it if it already exists with the same
    /// payload type.
    pub fn register<T: Send + Sync + 'static>(&self, name: &str) -> Result<EventHandle<T>, EventError> {
        if let Some(handle) = self.lookup::<T>(name)? {
            return Ok(handle);
        }
        if self.is_sealed() {
            return Err(EventError::RegistrySealed(name.to_owned()));
        }

        let mut table = self.table.write();
        // Another thread may have won the race between the read and write lock.
        if let Some(&id) = table.by_name.get(name) {
            return self.check_payload::<T>(&table.slots[id.0], id);
        }

        let id = EventId(table.slots.len());
        let name: Arc<str> = Arc::from(name);
        table.slots.push(EventSlot {
            name: Arc::clone(&name),
            payload: TypeId::of::<T>(),
            payload_name: std::any::type_name::<T>(),
            subscribers: Arc::new(Vec::new()),
        });
        table.by_name.insert(Arc::clone(&name), id);

        tracing::debug!("Registered event '{}' ({})", name, std::any::type_name::<T>());
        Ok(EventHandle::new(self.id, id))
    }

    /// Look up an already registered event
    pub fn handle<T: Send + Sync + 'static>(&self, name: &str) -> Result<EventHandle<T>, EventError> {
        self.lookup::<T>(name)?
            .ok_or_else(|| EventError::UnknownEvent(name.to_owned()))
    }

    fn lookup<T: Send + Sync + 'static>(&self, name: &str) -> Result<Option<EventHandle<T>>, EventError> {
        let table = self.table.read();
        match table.by_name.get(name) {
            Some(&id) => self.check_payload::<T>(&table.slots[id.0], id).map(Some),
            None => Ok(None),
        }
    }

    fn check_payload<T: 'static>(&self, slot: &EventSlot, id: EventId) -> Result<EventHandle<T>, EventError> {
        if slot.payload == TypeId::of::<T>() {
            Ok(EventHandle::new(self.id, id))
        } else {
            Err(EventError::DuplicateEventName {
                event: slot.name.to_string(),
                registered: slot.payload_name,
                requested: std::any::type_name::<T>(),
            })
        }
    }

    fn check_issuer<T>(&self, handle: &EventHandle<T>) -> Result<(), EventError> {
        if handle.registry == self.id {
            Ok(())
        } else {
            Err(EventError::UnknownEvent(format!("#{} of registry {}", handle.id.0, handle.registry)))
        }
    }

    /// Append a handler to the event's subscriber list
    pub fn subscribe<T, F>(&self, handle: &EventHandle<T>, owner: &str, handler: F) -> Result<(), EventError>
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.check_issuer(handle)?;
        let mut table = self.table.write();
        let slot = table
            .slots
            .get_mut(handle.id.0)
            .ok_or_else(|| EventError::UnknownEvent(format!("#{}", handle.id.0)))?;
        if self.sealed.load(Ordering::Acquire) {
            return Err(EventError::RegistrySealed(slot.name.to_string()));
        }
        self.check_payload::<T>(slot, handle.id)?;

        let event_name = Arc::clone(&slot.name);
        let erased = move |payload: &(dyn Any + Send + Sync)| -> anyhow::Result<()> {
            let payload = payload
                .downcast_ref::<T>()
                .ok_or_else(|| anyhow::anyhow!("payload of '{}' is not {}", event_name, std::any::type_name::<T>()))?;
            handler(payload)
        };

        Arc::make_mut(&mut slot.subscribers).push(Subscriber {
            owner: Arc::from(owner),
            handler: Arc::new(erased),
        });

        tracing::debug!("Plugin {} subscribed to '{}'", owner, slot.name);
        Ok(())
    }

    /// Subscribe by event name. Fails if the event was never registered.
    pub fn subscribe_named<T, F>(&self, name: &str, owner: &str, handler: F) -> Result<EventHandle<T>, EventError>
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handle = self.handle::<T>(name)?;
        self.subscribe(&handle, owner, handler)?;
        Ok(handle)
    }

    /// Invoke every subscriber of the event in subscription order
    pub fn emit<T: Send + Sync + 'static>(&self, handle: &EventHandle<T>, payload: &T) -> Result<EmitReport, EventError> {
        self.check_issuer(handle)?;
        let (name, subscribers) = {
            let table = self.table.read();
            let slot = table
                .slots
                .get(handle.id.0)
                .ok_or_else(|| EventError::UnknownEvent(format!("#{}", handle.id.0)))?;
            self.check_payload::<T>(slot, handle.id)?;
            (Arc::clone(&slot.name), Arc::clone(&slot.subscribers))
        };

        let mut report = EmitReport {
            event: name.to_string(),
            ..EmitReport::default()
        };

        let erased: &(dyn Any + Send + Sync) = payload;
        for subscriber in subscribers.iter() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (subscriber.handler)(erased)));
            let failure = match outcome {
                Ok(Ok(())) => {
                    report.delivered += 1;
                    continue;
                }
                Ok(Err(e)) => HandlerExecutionError {
                    plugin: subscriber.owner.to_string(),
                    event: name.to_string(),
                    message: format!("{e:#}"),
                    panicked: false,
                },
                Err(panic) => HandlerExecutionError {
                    plugin: subscriber.owner.to_string(),
                    event: name.to_string(),
                    message: panic_message(panic.as_ref()),
                    panicked: true,
                },
            };

            tracing::error!(
                plugin = %failure.plugin,
                event = %failure.event,
                panicked = failure.panicked,
                "Event handler failed: {}",
                failure.message
            );
            report.failures.push(failure);
        }

        Ok(report)
    }

    /// Emit by event name. Fails if the event was never registered.
    pub fn emit_named<T: Send + Sync + 'static>(&self, name: &str, payload: &T) -> Result<EmitReport, EventError> {
        let handle = self.handle::<T>(name)?;
        self.emit(&handle, payload)
    }

    /// Drop every subscription owned by `owner`
    pub(crate) fn unsubscribe_owner(&self, owner: &str) -> usize {
        let mut table = self.table.write();
        let mut removed = 0;
        for slot in &mut table.slots {
            let before = slot.subscribers.len();
            if slot.subscribers.iter().any(|s| &*s.owner == owner) {
                Arc::make_mut(&mut slot.subscribers).retain(|s| &*s.owner != owner);
            }
            removed += before - slot.subscribers.len();
        }
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.read().by_name.contains_key(name)
    }

    pub fn name_of(&self, id: EventId) -> Option<String> {
        self.table.read().slots.get(id.0).map(|slot| slot.name.to_string())
    }

    /// Event names in registration order
    pub fn event_names(&self) -> Vec<String> {
        self.table.read().slots.iter().map(|slot| slot.name.to_string()).collect()
    }

    pub fn event_count(&self) -> usize {
        self.table.read().slots.len()
    }

    pub fn subscriber_count<T>(&self, handle: &EventHandle<T>) -> usize {
        if handle.registry != self.id {
            return 0;
        }
        self.table
            .read()
            .slots
            .get(handle.id.0)
            .map_or(0, |slot| slot.subscribers.len())
    }

    /// Owners of the event's subscribers, in invocation order
    pub fn subscribers_of(&self, name: &str) -> Result<Vec<String>, EventError> {
        let table = self.table.read();
        let id = table
            .by_name
            .get(name)
            .ok_or_else(|| EventError::UnknownEvent(name.to_owned()))?;
        Ok(table.slots[id.0].subscribers.iter().map(|s| s.owner.to_string()).collect())
    }

    /// Freeze the set of events and subscriptions. Emission is unaffected.
    pub fn seal(&self) {
        if !self.sealed.swap(true, Ordering::AcqRel) {
            tracing::debug!("Event registry sealed with {} events", self.event_count());
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }
}

impl Default for EventCore {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_owned()
    }
}
