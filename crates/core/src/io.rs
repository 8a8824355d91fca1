//! Outbound packet path and connection events
//!
//! The network loop lives outside this crate. It owns the receiving end of
//! the [`OutboundQueue`] channel and frames whatever it drains; plugins only
//! see the `IO` capability, a shared [`PacketSink`].

use crate::dispatch::PacketDispatcher;
use crate::error::EventError;
use crate::event::EventHandle;
use anyhow::{bail, Result};
use proto::{Packet, PacketDirection};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Event raised once the transport has connected
pub const IO_CONNECT_EVENT: &str = "io_connect";
/// Event raised when the session is being torn down
pub const KILL_EVENT: &str = "kill";

/// Anything that can take a packet for transmission
pub trait PacketSink: Send + Sync {
    fn send(&self, packet: Packet) -> Result<()>;
}

/// Shape of the `IO` capability
pub type SharedSink = Arc<dyn PacketSink>;

/// Payload of [`IO_CONNECT_EVENT`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectData {
    pub host: String,
    pub port: u16,
}

/// Unbounded queue of serverbound packets waiting for the network loop
pub struct OutboundQueue {
    dispatcher: Arc<PacketDispatcher>,
    tx: mpsc::UnboundedSender<Packet>,
    connect: EventHandle<ConnectData>,
    kill: EventHandle<()>,
}

impl OutboundQueue {
    pub fn new(dispatcher: Arc<PacketDispatcher>) -> Result<(Self, mpsc::UnboundedReceiver<Packet>), EventError> {
        let events = dispatcher.events();
        let connect = events.register::<ConnectData>(IO_CONNECT_EVENT)?;
        let kill = events.register::<()>(KILL_EVENT)?;
        let (tx, rx) = mpsc::unbounded_channel();

        Ok((
            Self {
                dispatcher,
                tx,
                connect,
                kill,
            },
            rx,
        ))
    }

    pub fn notify_connected(&self, host: impl Into<String>, port: u16) -> Result<(), EventError> {
        let data = ConnectData {
            host: host.into(),
            port,
        };
        tracing::info!("Connected to {}:{}", data.host, data.port);
        self.dispatcher.events().emit(&self.connect, &data).map(drop)
    }

    pub fn notify_kill(&self) -> Result<(), EventError> {
        tracing::info!("Kill requested");
        self.dispatcher.events().emit(&self.kill, &()).map(drop)
    }

    /// True once the network loop dropped its receiver
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl PacketSink for OutboundQueue {
    /// Raise the packet's event, then queue it for the network loop. A closed
    /// queue fails before any observer sees the packet.
    fn send(&self, packet: Packet) -> Result<()> {
        if packet.direction() != PacketDirection::Serverbound {
            bail!("refusing to send {} packet {}", packet.direction(), packet.name());
        }
        if self.tx.is_closed() {
            bail!("outbound queue closed, dropped {}", packet.name());
        }

        self.dispatcher.dispatch(&packet)?;

        let name = packet.name();
        if self.tx.send(packet).is_err() {
            bail!("outbound queue closed, dropped {}", name);
        }
        Ok(())
    }
}
